//! Bundle export and import orchestration.
//!
//! Both run the engine on the blocking pool with a [`CancelFlag`] that is
//! raised when the calling future is dropped. Export is additionally bounded
//! by the configured timeout.
//!
//! Import pipeline: decode, optional filter, flow layout, then the importer
//! inside one write transaction. Environment, variable and credential
//! events for the imported rows follow the commit.

use super::{Access, EventKind, Services};
use crate::error::{ApiError, ApiResult};
use apiworks_core::storage::reader;
use apiworks_core::storage::tables::{Credentials, Environments};
use apiworks_core::{
    Bundle, CancelFlag, EngineError, ExportFormat, ExportOptions, Id, ImportOptions, ImportResult,
    StoreError, check_cancel, decode, encode, ensure_flow_structure, export_workspace,
    filter_by_examples, filter_by_flows, import_bundle,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// An encoded bundle and what it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedBundle {
    pub format: ExportFormat,
    pub counts: BTreeMap<String, usize>,
    pub data: Vec<u8>,
}

/// Everything one import needs besides the caller.
#[derive(Debug, Clone, Default)]
pub struct BundleImport {
    pub workspace_id: Id,
    pub format: ExportFormat,
    pub data: Vec<u8>,
    pub options: ImportOptions,
    pub filter_examples: Option<Vec<Id>>,
    pub filter_flows: Option<Vec<Id>>,
}

/// Raises the flag when the owning future goes away.
struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

impl Services {
    /// Export on behalf of a member of the workspace.
    pub async fn export_bundle(
        self: &Arc<Self>,
        user: Id,
        workspace_id: Id,
        format: ExportFormat,
        options: ExportOptions,
    ) -> ApiResult<ExportedBundle> {
        self.require_member(user, workspace_id)?;
        self.export_workspace_data(workspace_id, format, options).await
    }

    /// Export without a membership check, for local administration.
    pub async fn export_workspace_data(
        self: &Arc<Self>,
        workspace_id: Id,
        format: ExportFormat,
        options: ExportOptions,
    ) -> ApiResult<ExportedBundle> {
        let cancel: CancelFlag = Arc::new(AtomicBool::new(false));
        let _guard = CancelOnDrop(Arc::clone(&cancel));
        let services = Arc::clone(self);
        let flag = Arc::clone(&cancel);

        let task = tokio::task::spawn_blocking(move || -> ApiResult<ExportedBundle> {
            let read = services.store.read()?;
            let bundle = export_workspace(&read, workspace_id, &options, &flag)?;
            check_cancel(&flag)?;
            let data = encode(&bundle, format).map_err(EngineError::from)?;
            Ok(ExportedBundle {
                format,
                counts: counts_of(&bundle),
                data,
            })
        });

        match tokio::time::timeout(self.export_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => {
                tracing::error!(error = %join, "export task failed");
                Err(ApiError::Internal)
            }
            Err(_) => {
                cancel.store(true, Ordering::Relaxed);
                tracing::warn!(
                    %workspace_id,
                    timeout_secs = self.export_timeout.as_secs(),
                    "export timed out"
                );
                Err(ApiError::DeadlineExceeded)
            }
        }
    }

    /// Import on behalf of a member of the target workspace.
    pub async fn import_bundle(self: &Arc<Self>, user: Id, request: BundleImport) -> ApiResult<ImportResult> {
        self.require_member(user, request.workspace_id)?;
        self.import_workspace_data(request).await
    }

    /// Import without a membership check, for local administration.
    pub async fn import_workspace_data(self: &Arc<Self>, request: BundleImport) -> ApiResult<ImportResult> {
        if request.filter_examples.is_some() && request.filter_flows.is_some() {
            return Err(ApiError::invalid(
                "filter_examples and filter_flows are mutually exclusive",
            ));
        }
        let workspace_id = request.workspace_id;
        let cancel: CancelFlag = Arc::new(AtomicBool::new(false));
        let _guard = CancelOnDrop(Arc::clone(&cancel));
        let services = Arc::clone(self);

        let task = tokio::task::spawn_blocking(move || services.run_import(request, &cancel));
        let result = task.await.map_err(|join| {
            tracing::error!(error = %join, "import task failed");
            ApiError::Internal
        })??;

        self.publish_imported(workspace_id, &result);
        Ok(result)
    }

    fn run_import(&self, request: BundleImport, cancel: &AtomicBool) -> ApiResult<ImportResult> {
        let started = Instant::now();
        let mut bundle = decode(&request.data, request.format).map_err(EngineError::from)?;
        if let Some(examples) = &request.filter_examples {
            let wanted: BTreeSet<Id> = examples.iter().copied().collect();
            filter_by_examples(&mut bundle, &wanted).map_err(EngineError::from)?;
        }
        if let Some(flows) = &request.filter_flows {
            let wanted: BTreeSet<Id> = flows.iter().copied().collect();
            filter_by_flows(&mut bundle, &wanted).map_err(EngineError::from)?;
        }
        ensure_flow_structure(&mut bundle, &self.layout);
        check_cancel(cancel)?;

        let options = ImportOptions {
            workspace_id: request.workspace_id,
            ..request.options
        };
        let result = self
            .store
            .write_with(|tx| import_bundle(tx, &bundle, &options, cancel).map_err(ApiError::from))?;
        tracing::info!(
            workspace_id = %request.workspace_id,
            format = %request.format,
            written = result.total_written(),
            skipped = result.skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "bundle imported"
        );
        Ok(result)
    }

    /// Announce imported environments, their variables and credentials.
    /// The import is already committed, so failures here are only logged.
    fn publish_imported(&self, workspace_id: Id, result: &ImportResult) {
        if let Err(err) = self.publish_imported_rows(result) {
            tracing::warn!(error = %err, %workspace_id, "import events incomplete");
        }
    }

    fn publish_imported_rows(&self, result: &ImportResult) -> Result<(), StoreError> {
        let read = self.store.read()?;
        for id in result.id_maps.environment.values() {
            let Some(env) = reader::find::<Environments>(&read, *id)? else {
                continue;
            };
            for variable in reader::variables_ordered(&read, env.id)? {
                self.publish_variable(env.workspace_id, EventKind::Insert, variable);
            }
            self.publish_environment(EventKind::Insert, env);
        }
        for id in result.id_maps.credential.values() {
            if let Some(credential) = reader::find::<Credentials>(&read, *id)? {
                self.publish_credential(EventKind::Insert, credential);
            }
        }
        Ok(())
    }

    fn require_member(&self, user: Id, workspace_id: Id) -> ApiResult<()> {
        let read = self.store.read()?;
        Access::new(&read, user).require(workspace_id)
    }

    /// Entity counts of a workspace, everything included.
    pub fn workspace_counts(&self, workspace_id: Id) -> ApiResult<BTreeMap<String, usize>> {
        let read = self.store.read()?;
        let bundle = export_workspace(&read, workspace_id, &ExportOptions::everything(), &AtomicBool::new(false))?;
        Ok(counts_of(&bundle))
    }
}

fn counts_of(bundle: &Bundle) -> BTreeMap<String, usize> {
    bundle
        .count_entities()
        .into_iter()
        .map(|(kind, n)| (kind.to_string(), n))
        .collect()
}
