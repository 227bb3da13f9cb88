//! # Engine Constants
//!
//! Fixed values the engine is compiled with. Anything an operator may want
//! to tune (the export deadline, stream buffers) has its default here and an
//! override in the app configuration.

use std::time::Duration;

/// Magic bytes opening a binary bundle.
///
/// - Binary bundle = Magic ("APWB") + Version (u8) + header length (u32 LE)
///   + postcard header + postcard payload.
pub const MAGIC_BYTES: &[u8; 4] = b"APWB";

/// Version of the binary bundle framing.
pub const BINARY_FORMAT_VERSION: u8 = 1;

/// In-band version every bundle carries, whatever its encoding.
///
/// Bundles with any other version are rejected on decode.
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// Largest binary payload accepted before deserialising (256 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 256 * 1024 * 1024;

/// Largest binary header accepted (64 KiB).
pub const MAX_HEADER_SIZE: usize = 64 * 1024;

/// Name of the bundle document inside a zip archive.
pub const ZIP_BUNDLE_ENTRY: &str = "workspace.yaml";

/// Name of the manifest inside a zip archive.
pub const ZIP_MANIFEST_ENTRY: &str = "manifest.json";

/// Wall-clock bound of a single workspace export.
pub const EXPORT_TIMEOUT: Duration = Duration::from_secs(120);

// =============================================================================
// FLOW LAYOUT
// =============================================================================

/// Default horizontal anchor of the start node.
pub const LAYOUT_START_X: f64 = 0.0;

/// Default vertical anchor of the start node.
pub const LAYOUT_START_Y: f64 = 0.0;

/// Horizontal gap between adjacent nodes on one level.
pub const NODE_SPACING_X: f64 = 400.0;

/// Vertical gap between levels.
pub const NODE_SPACING_Y: f64 = 300.0;

/// Name given to synthesised start nodes.
pub const START_NODE_NAME: &str = "Start";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length of entity names accepted through the API.
pub const MAX_NAME_LENGTH: usize = 256;

/// Maximum size of a cleartext credential secret.
pub const MAX_SECRET_LENGTH: usize = 16 * 1024;
