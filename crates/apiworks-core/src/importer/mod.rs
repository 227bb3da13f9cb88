//! # Importer
//!
//! Replays a [`Bundle`] into a workspace inside one caller-owned write
//! transaction. Nothing commits here: on any error the caller drops the
//! transaction and no partial bundle is ever persisted.
//!
//! ## Layers
//!
//! Rows are written in dependency order; each layer only references IDs
//! that earlier layers (or the allocation pass) already mapped.
//!
//! | Layer | Rows |
//! |-------|------|
//! | L0 | flows, collections |
//! | L1 | HTTP requests (bases, then deltas), files, environments, credentials, folders, endpoints |
//! | L2 | flow variables, nodes, HTTP sub-rows, environment variables, examples |
//! | L3 | edges, node payloads, example sub-rows, responses |
//!
//! ## IDs
//!
//! With `preserve_ids` off every row gets a fresh ID and every reference is
//! rewritten through the [`IdMaps`]. With it on, IDs are kept and a row
//! whose ID is already stored follows [`MergeMode`].
//!
//! HTTP header/param/form/assert rows lose their delta parent pointer on
//! import: the bundle carries no map for those kinds.

mod validate;

use crate::bundle::Bundle;
use crate::error::{EngineError, EngineResult, check_cancel};
use crate::id::Id;
use crate::model::{
    Environment, ExampleBodyRaw, ExampleKeyValue, File, FileKind, HttpKeyValue, NodePayload,
    Variable,
};
use crate::storage::Table;
use crate::storage::reader::{self, Owned, order_linked};
use crate::storage::tables::{
    AiMemoryNodes, AiNodes, AiProviderNodes, Collections, ConditionNodes, Credentials, Edges,
    Endpoints, Environments, ExampleAsserts, ExampleBodyForms, ExampleBodyRaws,
    ExampleBodyUrlEncoded, ExampleHeaders, ExampleQueries, Examples, Files, FlowVariables, Flows,
    Folders, ForEachNodes, ForNodes, HttpAsserts, HttpBodyForms, HttpBodyRaws, HttpBodyUrlEncoded,
    HttpHeaders, HttpSearchParams, Https, JsNodes, Nodes, NoopNodes, RequestNodes,
    ResponseAsserts, ResponseHeaders, Responses, Variables, Workspaces,
};
use crate::storage::writer;
use redb::WriteTransaction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::time::Instant;
use tracing::{debug, info};

/// What to do with a bundle row whose preserved ID is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Keep the stored row; later rows still reference it.
    #[default]
    Skip,
    /// Overwrite the stored row with the bundle's.
    Replace,
    /// Import the bundle row under a fresh ID.
    CreateNew,
}

impl std::str::FromStr for MergeMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(Self::Skip),
            "replace" => Ok(Self::Replace),
            "create_new" => Ok(Self::CreateNew),
            other => Err(EngineError::validation("merge_mode", format!("unknown merge mode {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    pub workspace_id: Id,
    /// Folder file that receives the imported root files.
    pub parent_folder_id: Option<Id>,
    pub create_files: bool,
    /// Give every imported base request, flow and credential without a file
    /// entry a fresh one. Needs `create_files`.
    pub synthesize_files: bool,
    pub merge_mode: MergeMode,
    pub preserve_ids: bool,
    pub import_http: bool,
    pub import_flows: bool,
    pub import_environments: bool,
    pub import_credentials: bool,
    pub import_collections: bool,
    /// Offset added to the `order` of imported root files.
    pub start_order: f64,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            workspace_id: Id::NIL,
            parent_folder_id: None,
            create_files: true,
            synthesize_files: false,
            merge_mode: MergeMode::Skip,
            preserve_ids: false,
            import_http: true,
            import_flows: true,
            import_environments: true,
            import_credentials: true,
            import_collections: true,
            start_order: 0.0,
        }
    }
}

impl ImportOptions {
    #[must_use]
    pub fn into_workspace(workspace_id: Id) -> Self {
        Self {
            workspace_id,
            ..Self::default()
        }
    }
}

/// Old bundle ID → stored ID, per kind.
pub type IdMap = BTreeMap<Id, Id>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdMaps {
    pub http: IdMap,
    pub flow: IdMap,
    pub node: IdMap,
    pub file: IdMap,
    pub environment: IdMap,
    pub credential: IdMap,
    pub collection: IdMap,
    pub folder: IdMap,
    pub endpoint: IdMap,
    pub example: IdMap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    /// Rows written per table.
    pub counts: BTreeMap<String, usize>,
    /// Rows left alone because their ID was taken (`MergeMode::Skip`).
    pub skipped: usize,
    pub id_maps: IdMaps,
}

impl ImportResult {
    #[must_use]
    pub fn total_written(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Import `bundle` into `options.workspace_id` under `tx`.
pub fn import_bundle(
    tx: &WriteTransaction,
    bundle: &Bundle,
    options: &ImportOptions,
    cancel: &AtomicBool,
) -> EngineResult<ImportResult> {
    let started = Instant::now();
    validate::validate(bundle, options)?;
    reader::get::<Workspaces>(tx, options.workspace_id)?;
    if let Some(folder) = options.parent_folder_id {
        match reader::find::<Files>(tx, folder)? {
            Some(f) if f.workspace_id == options.workspace_id && f.is_folder() => {}
            _ => return Err(EngineError::validation("parent_folder_id", "not a folder of the workspace")),
        }
    }

    let mut importer = Importer {
        tx,
        bundle,
        options,
        cancel,
        maps: IdMaps::default(),
        writes: BTreeMap::new(),
        result: ImportResult::default(),
    };
    importer.allocate()?;

    // L0
    importer.flows()?;
    importer.collections()?;
    check_cancel(cancel)?;

    // L1
    importer.https()?;
    importer.files()?;
    importer.environments()?;
    importer.credentials()?;
    importer.folders_and_endpoints()?;
    check_cancel(cancel)?;

    // L2
    importer.nodes()?;
    importer.http_children()?;
    importer.variables()?;
    importer.examples()?;
    check_cancel(cancel)?;

    // L3
    importer.edges_and_payloads()?;
    importer.example_children()?;
    importer.synthesize_files()?;

    let mut result = importer.result;
    result.id_maps = importer.maps;
    info!(
        workspace_id = %options.workspace_id,
        written = result.total_written(),
        skipped = result.skipped,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "bundle imported"
    );
    Ok(result)
}

// =============================================================================
// IMPORTER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Write {
    Insert,
    Replace,
    Skip,
}

struct Importer<'a> {
    tx: &'a WriteTransaction,
    bundle: &'a Bundle,
    options: &'a ImportOptions,
    cancel: &'a AtomicBool,
    maps: IdMaps,
    /// Write decision per stored ID.
    writes: BTreeMap<Id, Write>,
    result: ImportResult,
}

/// Map a reference that must resolve inside the bundle.
fn required(map: &IdMap, kind: &'static str, id: Id) -> EngineResult<Id> {
    map.get(&id)
        .copied()
        .ok_or_else(|| EngineError::invariant(format!("reference to {kind} {id} outside the bundle")))
}

impl Importer<'_> {
    /// Map an optional reference; unresolved ones survive only with preserved IDs.
    fn soft(&self, map: &IdMap, id: Option<Id>) -> Option<Id> {
        let id = id?;
        map.get(&id)
            .copied()
            .or(self.options.preserve_ids.then_some(id))
    }

    /// Choose the stored ID of a bundle row and record what to do with it.
    ///
    /// A preserved ID only merges with a stored row of the target workspace.
    /// One held by any other workspace is never touched or referenced: the
    /// bundle row gets a fresh ID instead.
    fn place<T: Owned>(&mut self, old: Id) -> EngineResult<Id> {
        let (id, write) = if !self.options.preserve_ids {
            (Id::new_now(), Write::Insert)
        } else {
            match reader::find::<T>(self.tx, old)? {
                None => (old, Write::Insert),
                Some(stored) if T::workspace_of(self.tx, &stored)? != Some(self.options.workspace_id) => {
                    debug!(table = T::NAME, id = %old, "preserved id held by another workspace");
                    (Id::new_now(), Write::Insert)
                }
                Some(_) => match self.options.merge_mode {
                    MergeMode::Skip => (old, Write::Skip),
                    MergeMode::Replace => (old, Write::Replace),
                    MergeMode::CreateNew => (Id::new_now(), Write::Insert),
                },
            }
        };
        self.writes.insert(id, write);
        Ok(id)
    }

    fn decision(&self, id: Id) -> Write {
        self.writes.get(&id).copied().unwrap_or(Write::Insert)
    }

    fn count(&mut self, table: &'static str) {
        *self.result.counts.entry(table.to_string()).or_default() += 1;
    }

    fn put<T: Table>(&mut self, model: &T::Model) -> EngineResult<()> {
        match self.decision(T::id(model)) {
            Write::Insert => writer::insert::<T>(self.tx, model)?,
            Write::Replace => {
                writer::upsert::<T>(self.tx, model)?;
            }
            Write::Skip => {
                self.result.skipped += 1;
                return Ok(());
            }
        }
        self.count(T::NAME);
        Ok(())
    }

    /// Allocate stored IDs for every kind other rows point at.
    fn allocate(&mut self) -> EngineResult<()> {
        let bundle = self.bundle;
        if self.options.import_flows {
            for flow in &bundle.flows {
                let id = self.place::<Flows>(flow.id)?;
                self.maps.flow.insert(flow.id, id);
            }
            for node in &bundle.nodes {
                let id = self.place::<Nodes>(node.id)?;
                self.maps.node.insert(node.id, id);
            }
        }
        if self.options.import_http {
            for http in &bundle.https {
                let id = self.place::<Https>(http.id)?;
                self.maps.http.insert(http.id, id);
            }
        }
        if self.options.create_files {
            for file in &bundle.files {
                let id = self.place::<Files>(file.id)?;
                self.maps.file.insert(file.id, id);
            }
        }
        if self.options.import_environments {
            for env in &bundle.environments {
                let id = self.place::<Environments>(env.id)?;
                self.maps.environment.insert(env.id, id);
            }
        }
        if self.options.import_credentials {
            for credential in &bundle.credentials {
                let id = self.place::<Credentials>(credential.id)?;
                self.maps.credential.insert(credential.id, id);
            }
        }
        if self.options.import_collections {
            for collection in &bundle.collections {
                let id = self.place::<Collections>(collection.id)?;
                self.maps.collection.insert(collection.id, id);
            }
            for folder in &bundle.folders {
                let id = self.place::<Folders>(folder.id)?;
                self.maps.folder.insert(folder.id, id);
            }
            for endpoint in &bundle.endpoints {
                let id = self.place::<Endpoints>(endpoint.id)?;
                self.maps.endpoint.insert(endpoint.id, id);
            }
            for example in &bundle.examples {
                let id = self.place::<Examples>(example.id)?;
                self.maps.example.insert(example.id, id);
            }
        }
        debug!(
            flows = self.maps.flow.len(),
            https = self.maps.http.len(),
            examples = self.maps.example.len(),
            "import ids allocated"
        );
        Ok(())
    }

    // =========================================================================
    // L0
    // =========================================================================

    fn flows(&mut self) -> EngineResult<()> {
        if !self.options.import_flows {
            return Ok(());
        }
        for flow in &self.bundle.flows {
            let mut row = flow.clone();
            row.id = required(&self.maps.flow, "flow", flow.id)?;
            row.workspace_id = self.options.workspace_id;
            row.version_parent_id = self.soft(&self.maps.flow, flow.version_parent_id);
            self.put::<Flows>(&row)?;
        }
        Ok(())
    }

    fn collections(&mut self) -> EngineResult<()> {
        if !self.options.import_collections {
            return Ok(());
        }
        for collection in &self.bundle.collections {
            let mut row = collection.clone();
            row.id = required(&self.maps.collection, "collection", collection.id)?;
            row.workspace_id = self.options.workspace_id;
            self.put::<Collections>(&row)?;
        }
        Ok(())
    }

    // =========================================================================
    // L1
    // =========================================================================

    fn https(&mut self) -> EngineResult<()> {
        if !self.options.import_http {
            return Ok(());
        }
        let bundle = self.bundle;
        let bases = bundle.https.iter().filter(|h| !h.is_delta);
        let deltas = bundle.https.iter().filter(|h| h.is_delta);
        for http in bases.chain(deltas) {
            check_cancel(self.cancel)?;
            let mut row = http.clone();
            row.id = required(&self.maps.http, "http", http.id)?;
            row.workspace_id = self.options.workspace_id;
            row.folder_id = self.soft(&self.maps.file, http.folder_id);
            row.parent_http_id = match http.parent_http_id.filter(|_| http.is_delta) {
                Some(parent) => Some(self.delta_base(row.id, parent)?),
                None => None,
            };
            self.put::<Https>(&row)?;
        }
        Ok(())
    }

    /// Stored ID of the base of a delta request.
    fn delta_base(&self, delta: Id, parent: Id) -> EngineResult<Id> {
        if let Some(&mapped) = self.maps.http.get(&parent) {
            return Ok(mapped);
        }
        match reader::find::<Https>(self.tx, parent)? {
            Some(base) if !base.is_delta && base.workspace_id == self.options.workspace_id => Ok(parent),
            _ => Err(EngineError::invariant(format!(
                "delta request {delta} has no base request {parent}"
            ))),
        }
    }

    fn files(&mut self) -> EngineResult<()> {
        if !self.options.create_files {
            return Ok(());
        }
        for file in validate::parents_first(&self.bundle.files)? {
            let content_id = match file.content_type {
                FileKind::Folder => None,
                FileKind::Http => self.soft(&self.maps.http, file.content_id),
                FileKind::Flow => self.soft(&self.maps.flow, file.content_id),
                FileKind::Credential => self.soft(&self.maps.credential, file.content_id),
            };
            if !file.is_folder() && content_id.is_none() {
                // Content was not imported; children of this entry become roots.
                debug!(file_id = %file.id, "file without imported content dropped");
                self.maps.file.remove(&file.id);
                continue;
            }
            let parent = file.parent_id.and_then(|p| self.maps.file.get(&p).copied());
            let mut row = file.clone();
            row.id = required(&self.maps.file, "file", file.id)?;
            row.workspace_id = self.options.workspace_id;
            row.content_id = content_id;
            if parent.is_some() {
                row.parent_id = parent;
            } else {
                row.parent_id = self.options.parent_folder_id;
                row.order += self.options.start_order;
            }
            self.put::<Files>(&row)?;
        }
        Ok(())
    }

    /// Append imported environments to the tail of the workspace list.
    fn environments(&mut self) -> EngineResult<()> {
        if !self.options.import_environments {
            return Ok(());
        }
        let mut workspace = reader::get::<Workspaces>(self.tx, self.options.workspace_id)?;
        let before = workspace.clone();

        for env in order_linked(self.bundle.environments.clone()) {
            let old = env.id;
            let mut row = Environment {
                id: required(&self.maps.environment, "environment", old)?,
                workspace_id: self.options.workspace_id,
                ..env
            };
            if row.is_global && workspace.global_env.is_some_and(|g| g != row.id) {
                row.is_global = false;
            }
            match self.decision(row.id) {
                Write::Insert => {
                    writer::append_environment(self.tx, &row)?;
                    self.count(Environments::NAME);
                }
                Write::Replace => {
                    let stored = reader::get::<Environments>(self.tx, row.id)?;
                    row.prev = stored.prev;
                    row.next = stored.next;
                    row.display_order = stored.display_order;
                    row.workspace_id = stored.workspace_id;
                    writer::update::<Environments>(self.tx, &row)?;
                    self.count(Environments::NAME);
                }
                Write::Skip => self.result.skipped += 1,
            }
            if row.is_global && workspace.global_env.is_none() {
                workspace.global_env = Some(row.id);
            }
        }

        if workspace.active_env.is_none() {
            workspace.active_env = self
                .bundle
                .workspace
                .active_env
                .and_then(|env| self.maps.environment.get(&env).copied());
        }
        if workspace != before {
            workspace.updated = crate::model::unix_now();
            writer::update::<Workspaces>(self.tx, &workspace)?;
        }
        Ok(())
    }

    fn credentials(&mut self) -> EngineResult<()> {
        if !self.options.import_credentials {
            return Ok(());
        }
        let bundle = self.bundle;
        for credential in &bundle.credentials {
            let mut row = credential.clone();
            row.id = required(&self.maps.credential, "credential", credential.id)?;
            row.workspace_id = self.options.workspace_id;
            self.put::<Credentials>(&row)?;

            let Some(secret) = bundle
                .credential_secrets
                .iter()
                .find(|s| s.credential_id == credential.id)
            else {
                continue;
            };
            if self.decision(row.id) != Write::Skip {
                let mut secret = secret.clone();
                secret.credential_id = row.id;
                writer::put_secret(self.tx, &row, &secret)?;
                self.count("credential_secret");
            }
        }
        if let Some(orphan) = bundle
            .credential_secrets
            .iter()
            .find(|s| !self.maps.credential.contains_key(&s.credential_id))
        {
            return Err(EngineError::invariant(format!(
                "secret for unknown credential {}",
                orphan.credential_id
            )));
        }
        Ok(())
    }

    fn folders_and_endpoints(&mut self) -> EngineResult<()> {
        if !self.options.import_collections {
            return Ok(());
        }
        let bundle = self.bundle;
        for folder in &bundle.folders {
            let mut row = folder.clone();
            row.id = required(&self.maps.folder, "folder", folder.id)?;
            row.collection_id = required(&self.maps.collection, "collection", folder.collection_id)?;
            row.parent_id = self.soft(&self.maps.folder, folder.parent_id);
            row.prev = folder.prev.and_then(|p| self.maps.folder.get(&p).copied());
            row.next = folder.next.and_then(|n| self.maps.folder.get(&n).copied());
            self.put::<Folders>(&row)?;
        }
        for endpoint in &bundle.endpoints {
            let mut row = endpoint.clone();
            row.id = required(&self.maps.endpoint, "endpoint", endpoint.id)?;
            row.collection_id = required(&self.maps.collection, "collection", endpoint.collection_id)?;
            row.folder_id = self.soft(&self.maps.folder, endpoint.folder_id);
            row.prev = endpoint.prev.and_then(|p| self.maps.endpoint.get(&p).copied());
            row.next = endpoint.next.and_then(|n| self.maps.endpoint.get(&n).copied());
            self.put::<Endpoints>(&row)?;
        }
        Ok(())
    }

    // =========================================================================
    // L2
    // =========================================================================

    fn nodes(&mut self) -> EngineResult<()> {
        if !self.options.import_flows {
            return Ok(());
        }
        let bundle = self.bundle;
        for var in &bundle.flow_variables {
            let mut row = var.clone();
            row.flow_id = required(&self.maps.flow, "flow", var.flow_id)?;
            row.id = self.place::<FlowVariables>(var.id)?;
            self.put::<FlowVariables>(&row)?;
        }
        for node in &bundle.nodes {
            check_cancel(self.cancel)?;
            let mut row = node.clone();
            row.id = required(&self.maps.node, "node", node.id)?;
            row.flow_id = required(&self.maps.flow, "flow", node.flow_id)?;
            self.put::<Nodes>(&row)?;
        }
        Ok(())
    }

    fn http_children(&mut self) -> EngineResult<()> {
        if !self.options.import_http {
            return Ok(());
        }
        let bundle = self.bundle;
        self.http_key_values::<HttpHeaders>(&bundle.http_headers)?;
        self.http_key_values::<HttpSearchParams>(&bundle.http_search_params)?;
        self.http_key_values::<HttpBodyForms>(&bundle.http_body_forms)?;
        self.http_key_values::<HttpBodyUrlEncoded>(&bundle.http_body_urlencoded)?;

        for assert in &bundle.http_asserts {
            let mut row = assert.clone();
            row.http_id = required(&self.maps.http, "http", assert.http_id)?;
            row.id = self.place::<HttpAsserts>(assert.id)?;
            row.parent_id = None;
            row.is_delta = false;
            self.put::<HttpAsserts>(&row)?;
        }
        self.http_bodies()
    }

    fn http_key_values<T>(&mut self, rows: &[HttpKeyValue]) -> EngineResult<()>
    where
        T: Owned<Model = HttpKeyValue>,
    {
        for kv in rows {
            let mut row = kv.clone();
            row.http_id = required(&self.maps.http, "http", kv.http_id)?;
            row.id = self.place::<T>(kv.id)?;
            row.parent_id = None;
            row.is_delta = false;
            self.put::<T>(&row)?;
        }
        Ok(())
    }

    /// Raw bodies in two passes: every base row, then every delta row, so a
    /// delta's parent body is already mapped.
    fn http_bodies(&mut self) -> EngineResult<()> {
        let bundle = self.bundle;
        let mut bodies = IdMap::new();
        for delta_pass in [false, true] {
            for body in bundle.http_body_raws.iter().filter(|b| b.is_delta == delta_pass) {
                let mut row = body.clone();
                row.http_id = required(&self.maps.http, "http", body.http_id)?;
                row.id = self.place::<HttpBodyRaws>(body.id)?;
                bodies.insert(body.id, row.id);
                if delta_pass {
                    row.raw_data.clear();
                    row.parent_body_raw_id = body
                        .parent_body_raw_id
                        .and_then(|p| bodies.get(&p).copied())
                        .or_else(|| self.base_body(body.http_id, &bodies))
                        .or(body.parent_body_raw_id.filter(|_| self.options.preserve_ids));
                } else {
                    row.parent_body_raw_id = None;
                }
                self.put::<HttpBodyRaws>(&row)?;
            }
        }
        Ok(())
    }

    /// Stored ID of the base body of the request `delta_http` overrides.
    fn base_body(&self, delta_http: Id, bodies: &IdMap) -> Option<Id> {
        let base_http = self.bundle.get_http_by_id(delta_http)?.parent_http_id?;
        self.bundle
            .http_body_raws
            .iter()
            .find(|b| b.http_id == base_http && !b.is_delta)
            .and_then(|b| bodies.get(&b.id).copied())
    }

    fn variables(&mut self) -> EngineResult<()> {
        if !self.options.import_environments {
            return Ok(());
        }
        let bundle = self.bundle;
        if let Some(orphan) = bundle
            .variables
            .iter()
            .find(|v| !self.maps.environment.contains_key(&v.env_id))
        {
            return Err(EngineError::invariant(format!(
                "variable {} belongs to environment {} outside the bundle",
                orphan.id, orphan.env_id
            )));
        }
        for env in &bundle.environments {
            let env_id = required(&self.maps.environment, "environment", env.id)?;
            let vars: Vec<Variable> = bundle.variables.iter().filter(|v| v.env_id == env.id).cloned().collect();
            for var in order_linked(vars) {
                let mut row = Variable {
                    id: self.place::<Variables>(var.id)?,
                    env_id,
                    ..var
                };
                match self.decision(row.id) {
                    Write::Insert => {
                        writer::append_variable(self.tx, &row)?;
                        self.count(Variables::NAME);
                    }
                    Write::Replace => {
                        let stored = reader::get::<Variables>(self.tx, row.id)?;
                        row.env_id = stored.env_id;
                        row.prev = stored.prev;
                        row.next = stored.next;
                        row.display_order = stored.display_order;
                        writer::update::<Variables>(self.tx, &row)?;
                        self.count(Variables::NAME);
                    }
                    Write::Skip => self.result.skipped += 1,
                }
            }
        }
        Ok(())
    }

    fn examples(&mut self) -> EngineResult<()> {
        if !self.options.import_collections {
            return Ok(());
        }
        for example in &self.bundle.examples {
            let mut row = example.clone();
            row.id = required(&self.maps.example, "example", example.id)?;
            row.item_api_id = required(&self.maps.endpoint, "endpoint", example.item_api_id)?;
            row.collection_id = required(&self.maps.collection, "collection", example.collection_id)?;
            row.prev = example.prev.and_then(|p| self.maps.example.get(&p).copied());
            row.next = example.next.and_then(|n| self.maps.example.get(&n).copied());
            self.put::<Examples>(&row)?;
        }
        Ok(())
    }

    // =========================================================================
    // L3
    // =========================================================================

    fn edges_and_payloads(&mut self) -> EngineResult<()> {
        if !self.options.import_flows {
            return Ok(());
        }
        let bundle = self.bundle;
        for edge in &bundle.edges {
            let mut row = edge.clone();
            row.id = self.place::<Edges>(edge.id)?;
            row.flow_id = required(&self.maps.flow, "flow", edge.flow_id)?;
            row.source_id = required(&self.maps.node, "node", edge.source_id)?;
            row.target_id = required(&self.maps.node, "node", edge.target_id)?;
            self.put::<Edges>(&row)?;
        }
        for payload in bundle.payloads() {
            check_cancel(self.cancel)?;
            let payload = self.rebind(payload)?;
            match &payload {
                NodePayload::NoOp(p) => self.put::<NoopNodes>(p)?,
                NodePayload::Request(p) => self.put::<RequestNodes>(p)?,
                NodePayload::Condition(p) => self.put::<ConditionNodes>(p)?,
                NodePayload::For(p) => self.put::<ForNodes>(p)?,
                NodePayload::ForEach(p) => self.put::<ForEachNodes>(p)?,
                NodePayload::Js(p) => self.put::<JsNodes>(p)?,
                NodePayload::Ai(p) => self.put::<AiNodes>(p)?,
                NodePayload::AiProvider(p) => self.put::<AiProviderNodes>(p)?,
                NodePayload::AiMemory(p) => self.put::<AiMemoryNodes>(p)?,
            }
        }
        Ok(())
    }

    /// Point a payload at its stored node and rewrite its references.
    fn rebind(&self, mut payload: NodePayload) -> EngineResult<NodePayload> {
        payload.set_node_id(required(&self.maps.node, "node", payload.node_id())?);
        match &mut payload {
            NodePayload::Request(p) => {
                p.endpoint_id = self.request_ref(&self.maps.endpoint, p.endpoint_id);
                p.delta_endpoint_id = self.request_ref(&self.maps.endpoint, p.delta_endpoint_id);
                p.example_id = self.request_ref(&self.maps.example, p.example_id);
                p.delta_example_id = self.request_ref(&self.maps.example, p.delta_example_id);
            }
            NodePayload::AiProvider(p) => {
                p.credential_id = self.soft(&self.maps.credential, p.credential_id);
            }
            _ => {}
        }
        Ok(payload)
    }

    /// Request node references resolve through their own map, then the HTTP map.
    fn request_ref(&self, primary: &IdMap, id: Option<Id>) -> Option<Id> {
        let id = id?;
        primary
            .get(&id)
            .or_else(|| self.maps.http.get(&id))
            .copied()
            .or(self.options.preserve_ids.then_some(id))
    }

    fn example_children(&mut self) -> EngineResult<()> {
        if !self.options.import_collections {
            return Ok(());
        }
        let bundle = self.bundle;
        self.example_key_values::<ExampleHeaders>(&bundle.example_headers)?;
        self.example_key_values::<ExampleQueries>(&bundle.example_queries)?;
        self.example_key_values::<ExampleBodyForms>(&bundle.example_body_forms)?;
        self.example_key_values::<ExampleBodyUrlEncoded>(&bundle.example_body_urlencoded)?;

        let mut asserts = IdMap::new();
        for assert in &bundle.example_asserts {
            let mut row = assert.clone();
            row.example_id = required(&self.maps.example, "example", assert.example_id)?;
            row.id = self.place::<ExampleAsserts>(assert.id)?;
            asserts.insert(assert.id, row.id);
            self.put::<ExampleAsserts>(&row)?;
        }

        // Exactly one raw body per example; synthesise the missing ones.
        for example in &bundle.examples {
            let new_example = required(&self.maps.example, "example", example.id)?;
            let mut bodies = bundle.example_body_raws.iter().filter(|b| b.example_id == example.id);
            match (bodies.next(), bodies.next()) {
                (Some(_), Some(_)) => {
                    return Err(EngineError::invariant(format!(
                        "example {} has more than one raw body",
                        example.id
                    )));
                }
                (Some(body), None) => {
                    let mut row = body.clone();
                    row.example_id = new_example;
                    row.id = self.place::<ExampleBodyRaws>(body.id)?;
                    self.put::<ExampleBodyRaws>(&row)?;
                }
                _ if self.decision(new_example) == Write::Insert => {
                    let row = ExampleBodyRaw::empty(new_example);
                    self.writes.insert(row.id, Write::Insert);
                    self.put::<ExampleBodyRaws>(&row)?;
                }
                _ => {}
            }
        }

        let mut responses = IdMap::new();
        for response in &bundle.responses {
            let mut row = response.clone();
            row.example_id = required(&self.maps.example, "example", response.example_id)?;
            row.id = self.place::<Responses>(response.id)?;
            responses.insert(response.id, row.id);
            self.put::<Responses>(&row)?;
        }
        for header in &bundle.response_headers {
            let mut row = header.clone();
            row.response_id = required(&responses, "response", header.response_id)?;
            row.id = self.place::<ResponseHeaders>(header.id)?;
            self.put::<ResponseHeaders>(&row)?;
        }
        for assert in &bundle.response_asserts {
            let mut row = assert.clone();
            row.response_id = required(&responses, "response", assert.response_id)?;
            row.assert_id = self.soft(&asserts, assert.assert_id);
            row.id = self.place::<ResponseAsserts>(assert.id)?;
            self.put::<ResponseAsserts>(&row)?;
        }
        Ok(())
    }

    fn example_key_values<T>(&mut self, rows: &[ExampleKeyValue]) -> EngineResult<()>
    where
        T: Owned<Model = ExampleKeyValue>,
    {
        for kv in rows {
            let mut row = kv.clone();
            row.example_id = required(&self.maps.example, "example", kv.example_id)?;
            row.id = self.place::<T>(kv.id)?;
            self.put::<T>(&row)?;
        }
        Ok(())
    }

    /// A file entry for every newly created base request, flow and
    /// credential that the bundle gave none.
    fn synthesize_files(&mut self) -> EngineResult<()> {
        if !(self.options.create_files && self.options.synthesize_files) {
            return Ok(());
        }
        let bundle = self.bundle;
        let mut order = self.options.start_order
            + bundle
                .files
                .iter()
                .filter(|f| f.parent_id.is_none_or(|p| bundle.get_file_by_id(p).is_none()))
                .count() as f64;

        let mut wanted: Vec<(Id, Id, FileKind, String)> = Vec::new();
        for http in bundle.https.iter().filter(|h| !h.is_delta) {
            if let Some(&id) = self.maps.http.get(&http.id) {
                wanted.push((http.id, id, FileKind::Http, http.name.clone()));
            }
        }
        for flow in &bundle.flows {
            if let Some(&id) = self.maps.flow.get(&flow.id) {
                wanted.push((flow.id, id, FileKind::Flow, flow.name.clone()));
            }
        }
        for credential in &bundle.credentials {
            if let Some(&id) = self.maps.credential.get(&credential.id) {
                wanted.push((credential.id, id, FileKind::Credential, credential.name.clone()));
            }
        }

        for (old, id, kind, name) in wanted {
            if bundle.get_file_by_content_id(old).is_some() || self.decision(id) != Write::Insert {
                continue;
            }
            let file = File {
                id: Id::new_now(),
                workspace_id: self.options.workspace_id,
                parent_id: self.options.parent_folder_id,
                content_id: Some(id),
                content_type: kind,
                name,
                order,
            };
            order += 1.0;
            self.writes.insert(file.id, Write::Insert);
            self.put::<Files>(&file)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exporter::{ExportOptions, export_workspace};
    use crate::model::{
        AiModel, AiProviderNode, Credential, CredentialKind, Flow, Http, HttpBodyRaw, Node, NodeKind,
        NoopKind, NoopNode, Workspace,
    };
    use crate::storage::Store;
    use crate::storage::reader::list_by;

    fn store_with(ws: &Workspace) -> Store {
        let store = Store::in_memory().expect("store");
        store
            .write_with(|tx| writer::insert::<Workspaces>(tx, ws))
            .expect("workspace");
        store
    }

    fn import(store: &Store, bundle: &Bundle, options: &ImportOptions) -> EngineResult<ImportResult> {
        store.write_with(|tx| import_bundle(tx, bundle, options, &AtomicBool::new(false)))
    }

    fn flow_bundle(ws: &Workspace) -> Bundle {
        let mut bundle = Bundle::new(ws.clone());
        let flow = Flow::new(ws.id, "flow");
        let start = Node::new(flow.id, "Start", NodeKind::NoOp);
        bundle.push_payload(NodePayload::NoOp(NoopNode {
            flow_node_id: start.id,
            kind: NoopKind::Start,
        }));
        bundle.nodes.push(start);
        bundle.flows.push(flow);
        bundle
    }

    #[test]
    fn fresh_ids_are_mapped() {
        let source = Workspace::new("src");
        let target = Workspace::new("dst");
        let store = store_with(&target);
        let bundle = flow_bundle(&source);

        let options = ImportOptions {
            synthesize_files: true,
            ..ImportOptions::into_workspace(target.id)
        };
        let result = import(&store, &bundle, &options).expect("import");
        let old_flow = bundle.flows[0].id;
        let new_flow = result.id_maps.flow[&old_flow];
        assert_ne!(new_flow, old_flow);
        assert_eq!(result.counts["flow"], 1);
        assert_eq!(result.counts["flow_node_noop"], 1);

        let read = store.read().expect("read");
        let flows = list_by::<Flows>(&read, target.id).expect("flows");
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].id, new_flow);
        // one synthesised file for the flow
        assert_eq!(list_by::<Files>(&read, target.id).expect("files").len(), 1);
    }

    #[test]
    fn missing_workspace_fails_before_writing() {
        let store = Store::in_memory().expect("store");
        let bundle = flow_bundle(&Workspace::new("src"));
        let err = import(&store, &bundle, &ImportOptions::into_workspace(Id::new_now())).expect_err("missing");
        assert!(matches!(err, EngineError::NotFound { kind: "workspace", .. }));
    }

    #[test]
    fn failure_leaves_nothing_behind() {
        let target = Workspace::new("dst");
        let store = store_with(&target);
        let mut bundle = flow_bundle(&Workspace::new("src"));
        // second flow whose node payload is missing
        let flow = Flow::new(bundle.workspace.id, "broken");
        bundle.nodes.push(Node::new(flow.id, "js", NodeKind::Js));
        bundle.flows.push(flow);

        assert!(import(&store, &bundle, &ImportOptions::into_workspace(target.id)).is_err());
        let read = store.read().expect("read");
        assert!(list_by::<Flows>(&read, target.id).expect("flows").is_empty());
    }

    #[test]
    fn preserved_ids_follow_merge_mode() {
        let ws = Workspace::new("same");
        let store = store_with(&ws);
        let bundle = flow_bundle(&ws);
        let preserve = |merge_mode| ImportOptions {
            preserve_ids: true,
            merge_mode,
            create_files: false,
            ..ImportOptions::into_workspace(ws.id)
        };

        let first = import(&store, &bundle, &preserve(MergeMode::Skip)).expect("first");
        assert_eq!(first.id_maps.flow[&bundle.flows[0].id], bundle.flows[0].id);

        let skipped = import(&store, &bundle, &preserve(MergeMode::Skip)).expect("skip");
        assert_eq!(skipped.total_written(), 0);
        assert_eq!(skipped.skipped, 3);

        let mut renamed = bundle.clone();
        renamed.flows[0].name = "renamed".into();
        import(&store, &renamed, &preserve(MergeMode::Replace)).expect("replace");
        let read = store.read().expect("read");
        assert_eq!(reader::get::<Flows>(&read, bundle.flows[0].id).expect("flow").name, "renamed");
        drop(read);

        let copied = import(&store, &bundle, &preserve(MergeMode::CreateNew)).expect("create new");
        assert_ne!(copied.id_maps.flow[&bundle.flows[0].id], bundle.flows[0].id);
        let read = store.read().expect("read");
        assert_eq!(list_by::<Flows>(&read, ws.id).expect("flows").len(), 2);
    }

    #[test]
    fn preserved_ids_of_another_workspace_are_reallocated() {
        let owner = Workspace::new("owner");
        let other = Workspace::new("other");
        let owned = flow_bundle(&owner);
        let flow_id = owned.flows[0].id;
        let credential = Credential::new(owner.id, "key", CredentialKind::OpenAi);

        for merge_mode in [MergeMode::Skip, MergeMode::Replace, MergeMode::CreateNew] {
            let store = store_with(&owner);
            store
                .write_with(|tx| {
                    writer::insert::<Workspaces>(tx, &other)?;
                    writer::insert::<Flows>(tx, &owned.flows[0])?;
                    writer::insert::<Credentials>(tx, &credential)
                })
                .expect("seed");

            // Same IDs, pushed into the other workspace.
            let mut bundle = owned.clone();
            bundle.workspace = other.clone();
            bundle.flows[0].name = "renamed".into();
            let mut renamed = credential.clone();
            renamed.name = "renamed".into();
            bundle.credentials.push(renamed);

            let options = ImportOptions {
                preserve_ids: true,
                merge_mode,
                create_files: false,
                ..ImportOptions::into_workspace(other.id)
            };
            let result = import(&store, &bundle, &options).expect("import");
            assert_ne!(result.id_maps.flow[&flow_id], flow_id);
            assert_ne!(result.id_maps.credential[&credential.id], credential.id);
            assert_eq!(result.skipped, 0);

            let read = store.read().expect("read");
            let stored_flow = reader::get::<Flows>(&read, flow_id).expect("flow");
            assert_eq!((stored_flow.workspace_id, stored_flow.name.as_str()), (owner.id, "flow"));
            assert!(list_by::<Nodes>(&read, flow_id).expect("nodes").is_empty());
            let stored = reader::get::<Credentials>(&read, credential.id).expect("credential");
            assert_eq!((stored.workspace_id, stored.name.as_str()), (owner.id, "key"));
            assert_eq!(list_by::<Credentials>(&read, owner.id).expect("owned").len(), 1);
            assert_eq!(list_by::<Credentials>(&read, other.id).expect("imported").len(), 1);
            assert_eq!(list_by::<Flows>(&read, other.id).expect("flows").len(), 1);
        }
    }

    #[test]
    fn default_import_adds_no_file_entries() {
        let target = Workspace::new("dst");
        let store = store_with(&target);
        let mut bundle = flow_bundle(&Workspace::new("src"));
        bundle
            .credentials
            .push(Credential::new(bundle.workspace.id, "key", CredentialKind::Gemini));

        let result = import(&store, &bundle, &ImportOptions::into_workspace(target.id)).expect("import");
        assert!(!result.counts.contains_key(Files::NAME));
        let read = store.read().expect("read");
        assert!(list_by::<Files>(&read, target.id).expect("files").is_empty());
    }

    #[test]
    fn delta_bodies_keep_delta_bytes_and_parent() {
        let source = Workspace::new("src");
        let target = Workspace::new("dst");
        let store = store_with(&target);

        let mut bundle = Bundle::new(source.clone());
        let base = Http::new(source.id, "base", "POST", "/items");
        let delta = Http::delta_of(&base);
        let base_body = HttpBodyRaw::new(base.id, b"beta".to_vec(), "text/plain");
        let mut delta_body = HttpBodyRaw::new(delta.id, Vec::new(), "text/plain");
        delta_body.is_delta = true;
        delta_body.parent_body_raw_id = Some(base_body.id);
        delta_body.delta_raw_data = Some(b"delta".to_vec());
        delta_body.delta_content_type = Some("application/json".into());
        // delta listed first: the importer must still write the base first
        bundle.https = vec![delta.clone(), base.clone()];
        bundle.http_body_raws = vec![delta_body, base_body];

        let result = import(&store, &bundle, &ImportOptions::into_workspace(target.id)).expect("import");
        let read = store.read().expect("read");
        let new_delta = result.id_maps.http[&delta.id];
        let new_base = result.id_maps.http[&base.id];

        let stored_delta = reader::get::<Https>(&read, new_delta).expect("delta");
        assert_eq!(stored_delta.parent_http_id, Some(new_base));

        let base_bodies = list_by::<HttpBodyRaws>(&read, new_base).expect("base body");
        let delta_bodies = list_by::<HttpBodyRaws>(&read, new_delta).expect("delta body");
        assert_eq!(delta_bodies[0].parent_body_raw_id, Some(base_bodies[0].id));
        assert_eq!(delta_bodies[0].effective_data(), b"delta");
        assert!(delta_bodies[0].is_delta);
    }

    #[test]
    fn http_child_parent_pointers_are_cleared() {
        let source = Workspace::new("src");
        let target = Workspace::new("dst");
        let store = store_with(&target);
        let mut bundle = Bundle::new(source.clone());
        let http = Http::new(source.id, "h", "GET", "/");
        let base_header = HttpKeyValue::new(http.id, "a", "1");
        let mut delta_header = HttpKeyValue::new(http.id, "a", "2");
        delta_header.parent_id = Some(base_header.id);
        delta_header.is_delta = true;
        bundle.http_headers = vec![base_header, delta_header];
        bundle.https.push(http.clone());

        let result = import(&store, &bundle, &ImportOptions::into_workspace(target.id)).expect("import");
        let read = store.read().expect("read");
        let headers = list_by::<HttpHeaders>(&read, result.id_maps.http[&http.id]).expect("headers");
        assert_eq!(headers.len(), 2);
        assert!(headers.iter().all(|h| h.parent_id.is_none() && !h.is_delta));
    }

    #[test]
    fn environments_append_after_existing() {
        let target = Workspace::new("dst");
        let store = store_with(&target);
        store
            .write_with(|tx| writer::append_environment(tx, &Environment::new(target.id, "existing")))
            .expect("existing");

        let source = Workspace::new("src");
        let mut bundle = Bundle::new(source.clone());
        let env = Environment::new(source.id, "imported");
        bundle.variables.push(Variable::new(env.id, "host", "example.test"));
        bundle.environments.push(env);

        import(&store, &bundle, &ImportOptions::into_workspace(target.id)).expect("import");
        let read = store.read().expect("read");
        let envs = reader::environments_ordered(&read, target.id).expect("envs");
        let names: Vec<&str> = envs.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["existing", "imported"]);
        assert_eq!(envs[0].next, Some(envs[1].id));
        assert_eq!(envs[1].prev, Some(envs[0].id));
        let vars = reader::variables_ordered(&read, envs[1].id).expect("vars");
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn ai_provider_follows_remapped_credential() {
        let source = Workspace::new("src");
        let target = Workspace::new("dst");
        let store = store_with(&target);

        let mut bundle = flow_bundle(&source);
        let credential = Credential::new(source.id, "claude", CredentialKind::Anthropic);
        let node = Node::new(bundle.flows[0].id, "provider", NodeKind::AiProvider);
        bundle.push_payload(NodePayload::AiProvider(AiProviderNode {
            flow_node_id: node.id,
            credential_id: Some(credential.id),
            model: AiModel::ClaudeSonnet,
            custom_model: None,
            temperature: Some(0.9),
            max_tokens: Some(4096),
        }));
        bundle.nodes.push(node.clone());
        bundle.credentials.push(credential.clone());

        let result = import(&store, &bundle, &ImportOptions::into_workspace(target.id)).expect("import");
        let read = store.read().expect("read");
        let exported = export_workspace(&read, target.id, &ExportOptions::everything(), &AtomicBool::new(false))
            .expect("export");
        let provider = &exported.ai_provider_nodes[0];
        assert_eq!(provider.credential_id, Some(result.id_maps.credential[&credential.id]));
        assert_eq!(provider.max_tokens, Some(4096));
    }
}
