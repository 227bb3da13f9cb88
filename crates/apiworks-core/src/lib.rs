//! # apiworks-core
//!
//! The workspace bundle engine.
//!
//! A workspace (HTTP requests, collections, flows, environments, files and
//! credentials) is exported from the store into a [`Bundle`], encoded in one
//! of the [`ExportFormat`]s, and later decoded, optionally filtered and laid
//! out, then imported into another workspace inside one write transaction.
//!
//! ## Architectural Constraints
//!
//! - Synchronous: no async runtime, no network dependencies
//! - Every write goes through a redb `WriteTransaction` owned by the caller
//! - Credential secrets are stored sealed by the [`Vault`]
//! - IDs are time-ordered, so key order in every table is creation order

// =============================================================================
// MODULES
// =============================================================================

pub mod bundle;
pub mod error;
pub mod exporter;
pub mod filter;
pub mod formats;
pub mod id;
pub mod importer;
pub mod layout;
pub mod mapper;
pub mod model;
pub mod primitives;
pub mod storage;
pub mod vault;

// =============================================================================
// RE-EXPORTS: Foundations
// =============================================================================

pub use error::{CancelFlag, EngineError, EngineResult, check_cancel};
pub use id::{Id, IdError};
pub use vault::{EncryptionType, Vault, VaultError};

// =============================================================================
// RE-EXPORTS: Storage
// =============================================================================

pub use mapper::{Mapped, MapperError};
pub use storage::{ReadScope, Store, StoreError, Table};

// =============================================================================
// RE-EXPORTS: Bundle Engine
// =============================================================================

pub use bundle::Bundle;
pub use exporter::{ExportOptions, export_workspace};
pub use filter::{FilterError, filter_by_examples, filter_by_flows};
pub use formats::{ExportFormat, FormatError, decode, encode};
pub use importer::{IdMap, IdMaps, ImportOptions, ImportResult, MergeMode, import_bundle};
pub use layout::{LayoutConfig, ensure_flow_structure};
