//! # Bundle Wire Formats
//!
//! A [`Bundle`] travels in one of four encodings. Selection affects only
//! serialisation, never the bundle content.
//!
//! - `yaml` / `json`: human-readable documents. IDs are URL-safe base64,
//!   byte fields standard base64, enums lower_snake_case.
//! - `zip`: a Deflate archive holding `workspace.yaml` plus a
//!   `manifest.json` with the format version and entity counts.
//! - `binary`: framed postcard with a BLAKE3 digest (see [`binary`]).
//!
//! Every decoder checks the input size before parsing and rejects bundles
//! whose in-band `format_version` is not the current one.

mod archive;
pub mod binary;

use crate::bundle::Bundle;
use crate::primitives::{BUNDLE_FORMAT_VERSION, MAX_PAYLOAD_SIZE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("zip: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("postcard: {0}")]
    Postcard(#[from] postcard::Error),

    #[error("invalid magic bytes")]
    InvalidMagic,

    #[error("unsupported binary framing version {0}")]
    UnsupportedFraming(u8),

    #[error("unsupported bundle format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("input of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },

    #[error("truncated input: {0}")]
    Truncated(&'static str),

    #[error("payload digest mismatch")]
    DigestMismatch,

    #[error("entity count mismatch for {0}")]
    CountMismatch(String),

    #[error("archive is missing {0}")]
    MissingEntry(&'static str),

    #[error("unknown export format: {0}")]
    UnknownFormat(String),
}

/// Encoding of an exported bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Yaml,
    Json,
    Zip,
    Binary,
}

impl ExportFormat {
    pub const ALL: [Self; 4] = [Self::Yaml, Self::Json, Self::Zip, Self::Binary];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Zip => "zip",
            Self::Binary => "binary",
        }
    }

    /// Conventional file extension.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Zip => "zip",
            Self::Binary => "apwb",
        }
    }

    /// Guess the format from a file name, defaulting to YAML.
    #[must_use]
    pub fn from_path(path: &std::path::Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::Json,
            Some("zip") => Self::Zip,
            Some("apwb" | "bin") => Self::Binary,
            _ => Self::Yaml,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FormatError::UnknownFormat(s.to_string()))
    }
}

// =============================================================================
// ENCODE / DECODE
// =============================================================================

/// Serialise `bundle` in `format`.
pub fn encode(bundle: &Bundle, format: ExportFormat) -> Result<Vec<u8>, FormatError> {
    check_version(bundle.format_version)?;
    match format {
        ExportFormat::Yaml => Ok(serde_yaml::to_string(bundle)?.into_bytes()),
        ExportFormat::Json => Ok(serde_json::to_vec_pretty(bundle)?),
        ExportFormat::Zip => archive::write(bundle),
        ExportFormat::Binary => binary::write(bundle),
    }
}

/// Parse a bundle encoded in `format`.
pub fn decode(bytes: &[u8], format: ExportFormat) -> Result<Bundle, FormatError> {
    check_size(bytes.len())?;
    let bundle: Bundle = match format {
        ExportFormat::Yaml => serde_yaml::from_slice(bytes)?,
        ExportFormat::Json => serde_json::from_slice(bytes)?,
        ExportFormat::Zip => archive::read(bytes)?,
        ExportFormat::Binary => binary::read(bytes)?,
    };
    check_version(bundle.format_version)?;
    Ok(bundle)
}

fn check_size(size: usize) -> Result<(), FormatError> {
    if size > MAX_PAYLOAD_SIZE {
        return Err(FormatError::TooLarge {
            size,
            max: MAX_PAYLOAD_SIZE,
        });
    }
    Ok(())
}

fn check_version(found: u32) -> Result<(), FormatError> {
    if found != BUNDLE_FORMAT_VERSION {
        return Err(FormatError::UnsupportedVersion {
            found,
            expected: BUNDLE_FORMAT_VERSION,
        });
    }
    Ok(())
}

/// Entity counts with owned keys, as written into manifests and headers.
fn owned_counts(bundle: &Bundle) -> std::collections::BTreeMap<String, u64> {
    bundle
        .count_entities()
        .into_iter()
        .map(|(k, v)| (k.to_string(), v as u64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Id;
    use crate::model::{
        AiModel, AiProviderNode, Http, HttpBodyRaw, Node, NodeKind, NodePayload, Workspace,
    };

    fn sample() -> Bundle {
        let ws = Workspace::new("formats");
        let mut bundle = Bundle::new(ws.clone());
        let http = Http::new(ws.id, "list users", "GET", "https://api.test/users");
        let mut body = HttpBodyRaw::new(http.id, b"{\"a\":1}".to_vec(), "application/json");
        body.delta_raw_data = Some(vec![0, 159, 146, 150]);
        bundle.http_body_raws.push(body);
        bundle.https.push(http);

        let flow = crate::model::Flow::new(ws.id, "flow");
        let node = Node::new(flow.id, "provider", NodeKind::AiProvider);
        bundle.push_payload(NodePayload::AiProvider(AiProviderNode {
            flow_node_id: node.id,
            credential_id: Some(Id::new_now()),
            model: AiModel::ClaudeSonnet,
            custom_model: None,
            temperature: Some(0.9),
            max_tokens: Some(4096),
        }));
        bundle.nodes.push(node);
        bundle.flows.push(flow);
        bundle
    }

    #[test]
    fn every_format_preserves_content() {
        let bundle = sample();
        for format in ExportFormat::ALL {
            let bytes = encode(&bundle, format).expect("encode");
            let decoded = decode(&bytes, format).expect("decode");
            assert_eq!(decoded, bundle, "format {format}");
        }
    }

    #[test]
    fn text_formats_use_snake_case_and_base64() {
        let bundle = sample();
        let yaml = String::from_utf8(encode(&bundle, ExportFormat::Yaml).expect("yaml")).expect("utf8");
        assert!(yaml.contains("format_version: 1"));
        assert!(yaml.contains("model: claude_sonnet"));
        assert!(yaml.contains(&bundle.https[0].id.to_string()));

        let json = String::from_utf8(encode(&bundle, ExportFormat::Json).expect("json")).expect("utf8");
        assert!(json.contains("\"body_kind\": \"none\""));
        assert!(json.contains("\"raw_data\": \"eyJhIjoxfQ==\""));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let bundle = sample();
        let mut json: serde_json::Value =
            serde_json::from_slice(&encode(&bundle, ExportFormat::Json).expect("json")).expect("parse");
        json["format_version"] = serde_json::json!(99);
        let bytes = serde_json::to_vec(&json).expect("bytes");

        let err = decode(&bytes, ExportFormat::Json).expect_err("must reject");
        assert!(matches!(err, FormatError::UnsupportedVersion { found: 99, .. }));
    }

    #[test]
    fn format_names_parse() {
        assert_eq!("ZIP".parse::<ExportFormat>().expect("parse"), ExportFormat::Zip);
        assert!("xml".parse::<ExportFormat>().is_err());
        assert_eq!(
            ExportFormat::from_path(std::path::Path::new("out.json")),
            ExportFormat::Json
        );
    }
}
