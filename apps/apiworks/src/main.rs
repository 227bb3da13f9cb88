//! # apiworks
//!
//! ```bash
//! # Start the HTTP server
//! apiworks server --host 0.0.0.0 --port 8080
//!
//! # Local administration
//! apiworks init --name Demo --user <USER_ID>
//! apiworks export --workspace <ID> --output demo.zip --credentials
//! apiworks import --workspace <ID> --input demo.zip --merge-mode replace
//! apiworks filter --input demo.yaml --output one-flow.yaml --flows <FLOW_ID>
//! ```

use apiworks::cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // APIWORKS_LOG_FORMAT=json switches to machine-parseable output.
    let log_format = std::env::var("APIWORKS_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "apiworks=info,apiworks_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();
    if let Err(e) = cli::execute(cli).await {
        tracing::error!(error = %e, "command failed");
        std::process::exit(1);
    }
}
