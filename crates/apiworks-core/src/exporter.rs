//! # Exporter
//!
//! Walks one workspace through the reader layer and collects it into a
//! [`Bundle`]. The exporter never writes; it runs against any
//! [`ReadScope`], normally a read snapshot so the bundle is consistent.
//!
//! Order of work:
//! 1. Workspace header (`NotFound` when absent)
//! 2. Files, optionally restricted to one folder subtree
//! 3. HTTP requests with every sub-table
//! 4. Flows with variables, nodes, node payloads and edges
//! 5. Environments and their variables, in list order
//! 6. Collections down to example responses
//! 7. Credentials with their sealed side rows
//!
//! A node without its payload row is corrupt data and fails the export.

use crate::bundle::Bundle;
use crate::error::{EngineError, EngineResult, check_cancel};
use crate::id::Id;
use crate::model::{File, Flow, Http, Node, NodeKind, NodePayload};
use crate::storage::ReadScope;
use crate::storage::reader::{self, find, get, list_by};
use crate::storage::tables::{
    AiMemoryNodes, AiNodes, AiProviderNodes, Collections, ConditionNodes, Credentials, Edges,
    Endpoints, ExampleAsserts, ExampleBodyForms, ExampleBodyRaws, ExampleBodyUrlEncoded,
    ExampleHeaders, ExampleQueries, Files, FlowVariables, Flows, ForEachNodes, ForNodes,
    HttpAsserts, HttpBodyForms, HttpBodyRaws, HttpBodyUrlEncoded, HttpHeaders, HttpSearchParams,
    Https, JsNodes, Nodes, NoopNodes, RequestNodes, ResponseAsserts, ResponseHeaders, Responses,
    Workspaces,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::time::Instant;
use tracing::{debug, info};

/// What to export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub include_http: bool,
    pub include_flows: bool,
    pub include_environments: bool,
    pub include_files: bool,
    pub include_collections: bool,
    /// Off by default: secrets leave the store only when asked for.
    pub include_credentials: bool,
    /// Restrict files to this folder and everything below it.
    pub filter_by_folder_id: Option<Id>,
    pub filter_by_flow_ids: Vec<Id>,
    pub filter_by_http_ids: Vec<Id>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_http: true,
            include_flows: true,
            include_environments: true,
            include_files: true,
            include_collections: true,
            include_credentials: false,
            filter_by_folder_id: None,
            filter_by_flow_ids: Vec::new(),
            filter_by_http_ids: Vec::new(),
        }
    }
}

impl ExportOptions {
    /// Every kind, credentials included.
    #[must_use]
    pub fn everything() -> Self {
        Self {
            include_credentials: true,
            ..Self::default()
        }
    }
}

/// Export workspace `workspace_id` as seen by `scope`.
pub fn export_workspace(
    scope: &impl ReadScope,
    workspace_id: Id,
    options: &ExportOptions,
    cancel: &AtomicBool,
) -> EngineResult<Bundle> {
    let started = Instant::now();
    let workspace = get::<Workspaces>(scope, workspace_id)?;
    let mut bundle = Bundle::new(workspace);

    if options.include_files {
        export_files(scope, &mut bundle, options.filter_by_folder_id)?;
        check_cancel(cancel)?;
    }
    if options.include_http {
        export_https(scope, &mut bundle, &options.filter_by_http_ids, cancel)?;
    }
    if options.include_flows {
        export_flows(scope, &mut bundle, &options.filter_by_flow_ids, cancel)?;
    }
    if options.include_environments {
        for env in reader::environments_ordered(scope, workspace_id)? {
            bundle.variables.extend(reader::variables_ordered(scope, env.id)?);
            bundle.environments.push(env);
        }
        check_cancel(cancel)?;
    }
    if options.include_collections {
        export_collections(scope, &mut bundle, cancel)?;
    }
    if options.include_credentials {
        for credential in list_by::<Credentials>(scope, workspace_id)? {
            if let Some(secret) = reader::secret_for(scope, &credential)? {
                bundle.credential_secrets.push(secret);
            }
            bundle.credentials.push(credential);
        }
    }

    info!(
        workspace_id = %workspace_id,
        entities = bundle.total_entities(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "workspace exported"
    );
    Ok(bundle)
}

// =============================================================================
// FILES
// =============================================================================

fn export_files(scope: &impl ReadScope, bundle: &mut Bundle, folder: Option<Id>) -> EngineResult<()> {
    let files = list_by::<Files>(scope, bundle.workspace.id)?;
    let Some(root) = folder else {
        bundle.files = files;
        return Ok(());
    };
    if !files.iter().any(|f| f.id == root) {
        return Err(EngineError::NotFound { kind: "file", id: root });
    }
    bundle.files = subtree(files, root);
    Ok(())
}

/// `root` and every file below it, parents before children.
fn subtree(files: Vec<File>, root: Id) -> Vec<File> {
    let mut keep = BTreeSet::from([root]);
    let mut out = Vec::new();
    let mut pending = files;
    loop {
        let (inside, rest): (Vec<File>, Vec<File>) = pending
            .into_iter()
            .partition(|f| keep.contains(&f.id) || f.parent_id.is_some_and(|p| keep.contains(&p)));
        if inside.is_empty() {
            break;
        }
        keep.extend(inside.iter().map(|f| f.id));
        out.extend(inside);
        pending = rest;
    }
    out
}

// =============================================================================
// HTTP
// =============================================================================

fn export_https(
    scope: &impl ReadScope,
    bundle: &mut Bundle,
    only: &[Id],
    cancel: &AtomicBool,
) -> EngineResult<()> {
    let workspace_id = bundle.workspace.id;
    let https = if only.is_empty() {
        list_by::<Https>(scope, workspace_id)?
    } else {
        explicit_https(scope, workspace_id, only)?
    };

    for http in https {
        check_cancel(cancel)?;
        bundle.http_headers.extend(list_by::<HttpHeaders>(scope, http.id)?);
        bundle.http_search_params.extend(list_by::<HttpSearchParams>(scope, http.id)?);
        bundle.http_body_forms.extend(list_by::<HttpBodyForms>(scope, http.id)?);
        bundle.http_body_urlencoded.extend(list_by::<HttpBodyUrlEncoded>(scope, http.id)?);
        bundle.http_body_raws.extend(list_by::<HttpBodyRaws>(scope, http.id)?);
        bundle.http_asserts.extend(list_by::<HttpAsserts>(scope, http.id)?);
        bundle.https.push(http);
    }
    debug!(count = bundle.https.len(), "http requests exported");
    Ok(())
}

/// The requested requests plus the base of every requested delta, bases first.
fn explicit_https(scope: &impl ReadScope, workspace_id: Id, ids: &[Id]) -> EngineResult<Vec<Http>> {
    let mut picked: Vec<Http> = Vec::new();
    let mut seen = BTreeSet::new();
    for &id in ids {
        let http = owned::<Https>(scope, workspace_id, id, |h| h.workspace_id)?;
        if let Some(parent) = http.parent_http_id.filter(|_| http.is_delta)
            && seen.insert(parent)
        {
            picked.push(owned::<Https>(scope, workspace_id, parent, |h| h.workspace_id)?);
        }
        if seen.insert(http.id) {
            picked.push(http);
        }
    }
    picked.sort_by_key(|h| h.is_delta);
    Ok(picked)
}

/// Fetch a row that must belong to `workspace_id`; foreign rows read as absent.
fn owned<T: crate::storage::Table>(
    scope: &impl ReadScope,
    workspace_id: Id,
    id: Id,
    workspace_of: impl Fn(&T::Model) -> Id,
) -> EngineResult<T::Model> {
    match find::<T>(scope, id)? {
        Some(row) if workspace_of(&row) == workspace_id => Ok(row),
        _ => Err(EngineError::NotFound { kind: T::NAME, id }),
    }
}

// =============================================================================
// FLOWS
// =============================================================================

fn export_flows(
    scope: &impl ReadScope,
    bundle: &mut Bundle,
    only: &[Id],
    cancel: &AtomicBool,
) -> EngineResult<()> {
    let workspace_id = bundle.workspace.id;
    let flows: Vec<Flow> = if only.is_empty() {
        list_by::<Flows>(scope, workspace_id)?
    } else {
        only.iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|&id| owned::<Flows>(scope, workspace_id, id, |f| f.workspace_id))
            .collect::<EngineResult<_>>()?
    };

    for flow in flows {
        check_cancel(cancel)?;
        bundle.flow_variables.extend(list_by::<FlowVariables>(scope, flow.id)?);
        for node in list_by::<Nodes>(scope, flow.id)? {
            bundle.push_payload(node_payload(scope, &node)?);
            bundle.nodes.push(node);
        }
        bundle.edges.extend(list_by::<Edges>(scope, flow.id)?);
        bundle.flows.push(flow);
    }
    debug!(flows = bundle.flows.len(), nodes = bundle.nodes.len(), "flows exported");
    Ok(())
}

/// The payload row matching `node.kind`.
pub fn node_payload(scope: &impl ReadScope, node: &Node) -> EngineResult<NodePayload> {
    let payload = match node.kind {
        NodeKind::NoOp => find::<NoopNodes>(scope, node.id)?.map(NodePayload::NoOp),
        NodeKind::Request => find::<RequestNodes>(scope, node.id)?.map(NodePayload::Request),
        NodeKind::Condition => find::<ConditionNodes>(scope, node.id)?.map(NodePayload::Condition),
        NodeKind::For => find::<ForNodes>(scope, node.id)?.map(NodePayload::For),
        NodeKind::ForEach => find::<ForEachNodes>(scope, node.id)?.map(NodePayload::ForEach),
        NodeKind::Js => find::<JsNodes>(scope, node.id)?.map(NodePayload::Js),
        NodeKind::Ai => find::<AiNodes>(scope, node.id)?.map(NodePayload::Ai),
        NodeKind::AiProvider => find::<AiProviderNodes>(scope, node.id)?.map(NodePayload::AiProvider),
        NodeKind::AiMemory => find::<AiMemoryNodes>(scope, node.id)?.map(NodePayload::AiMemory),
    };
    payload.ok_or_else(|| {
        EngineError::invariant(format!("{} node {} has no payload row", node.kind, node.id))
    })
}

// =============================================================================
// COLLECTIONS
// =============================================================================

fn export_collections(scope: &impl ReadScope, bundle: &mut Bundle, cancel: &AtomicBool) -> EngineResult<()> {
    for collection in list_by::<Collections>(scope, bundle.workspace.id)? {
        check_cancel(cancel)?;
        bundle.folders.extend(reader::folders_ordered(scope, collection.id)?);
        for endpoint in list_by::<Endpoints>(scope, collection.id)? {
            for example in reader::examples_ordered(scope, endpoint.id)? {
                let id = example.id;
                bundle.example_headers.extend(list_by::<ExampleHeaders>(scope, id)?);
                bundle.example_queries.extend(list_by::<ExampleQueries>(scope, id)?);
                bundle.example_asserts.extend(list_by::<ExampleAsserts>(scope, id)?);
                bundle.example_body_forms.extend(list_by::<ExampleBodyForms>(scope, id)?);
                bundle.example_body_urlencoded.extend(list_by::<ExampleBodyUrlEncoded>(scope, id)?);
                bundle.example_body_raws.extend(list_by::<ExampleBodyRaws>(scope, id)?);
                for response in list_by::<Responses>(scope, id)? {
                    bundle.response_headers.extend(list_by::<ResponseHeaders>(scope, response.id)?);
                    bundle.response_asserts.extend(list_by::<ResponseAsserts>(scope, response.id)?);
                    bundle.responses.push(response);
                }
                bundle.examples.push(example);
            }
            bundle.endpoints.push(endpoint);
        }
        bundle.collections.push(collection);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Credential, CredentialKind, CredentialSecret, Environment, FileKind, HttpBodyRaw, NoopKind,
        NoopNode, Workspace,
    };
    use crate::storage::Store;
    use crate::storage::writer;
    use crate::vault::Vault;

    fn seeded() -> (Store, Workspace) {
        let store = Store::in_memory().expect("store");
        let ws = Workspace::new("export");
        store
            .write_with(|tx| -> EngineResult<()> {
                writer::insert::<Workspaces>(tx, &ws)?;
                let base = Http::new(ws.id, "get", "GET", "https://api.test");
                let delta = Http::delta_of(&base);
                writer::insert::<Https>(tx, &base)?;
                writer::insert::<Https>(tx, &delta)?;
                writer::insert::<HttpBodyRaws>(tx, &HttpBodyRaw::new(base.id, b"b".to_vec(), "text/plain"))?;

                let flow = Flow::new(ws.id, "flow");
                let start = Node::new(flow.id, "Start", NodeKind::NoOp);
                writer::insert::<Flows>(tx, &flow)?;
                writer::insert::<Nodes>(tx, &start)?;
                writer::insert::<NoopNodes>(tx, &NoopNode { flow_node_id: start.id, kind: NoopKind::Start })?;

                writer::append_environment(tx, &Environment::new(ws.id, "a"))?;
                writer::append_environment(tx, &Environment::new(ws.id, "b"))?;

                let cred = Credential::new(ws.id, "key", CredentialKind::Gemini);
                writer::insert::<Credentials>(tx, &cred)?;
                let secret = CredentialSecret::seal(&Vault::default(), cred.id, b"g-123", None)?;
                writer::put_secret(tx, &cred, &secret)?;
                Ok(())
            })
            .expect("seed");
        (store, ws)
    }

    #[test]
    fn missing_workspace_is_not_found() {
        let store = Store::in_memory().expect("store");
        let read = store.read().expect("read");
        let err = export_workspace(&read, Id::new_now(), &ExportOptions::default(), &AtomicBool::new(false))
            .expect_err("missing");
        assert!(matches!(err, EngineError::NotFound { kind: "workspace", .. }));
    }

    #[test]
    fn default_export_collects_everything_but_credentials() {
        let (store, ws) = seeded();
        let read = store.read().expect("read");
        let bundle = export_workspace(&read, ws.id, &ExportOptions::default(), &AtomicBool::new(false))
            .expect("export");
        assert_eq!(bundle.https.len(), 2);
        assert_eq!(bundle.http_body_raws.len(), 1);
        assert_eq!(bundle.flows.len(), 1);
        assert_eq!(bundle.noop_nodes.len(), 1);
        assert_eq!(bundle.environments.len(), 2);
        assert_eq!(bundle.environments[0].name, "a");
        assert!(bundle.credentials.is_empty());
    }

    #[test]
    fn credentials_export_sealed() {
        let (store, ws) = seeded();
        let read = store.read().expect("read");
        let bundle = export_workspace(&read, ws.id, &ExportOptions::everything(), &AtomicBool::new(false))
            .expect("export");
        assert_eq!(bundle.credentials.len(), 1);
        let secret = &bundle.credential_secrets[0];
        assert_ne!(secret.secret, b"g-123");
        assert_eq!(secret.open(&Vault::default()).expect("open"), b"g-123");
    }

    #[test]
    fn requesting_a_delta_brings_its_base() {
        let (store, ws) = seeded();
        let read = store.read().expect("read");
        let delta = list_by::<Https>(&read, ws.id)
            .expect("list")
            .into_iter()
            .find(|h| h.is_delta)
            .expect("delta");
        let options = ExportOptions {
            filter_by_http_ids: vec![delta.id],
            ..ExportOptions::default()
        };
        let bundle = export_workspace(&read, ws.id, &options, &AtomicBool::new(false)).expect("export");
        assert_eq!(bundle.https.len(), 2);
        assert!(!bundle.https[0].is_delta);
    }

    #[test]
    fn node_without_payload_is_an_invariant_violation() {
        let (store, ws) = seeded();
        store
            .write_with(|tx| -> EngineResult<()> {
                let flow = list_by::<Flows>(tx, ws.id)?.remove(0);
                writer::insert::<Nodes>(tx, &Node::new(flow.id, "orphan", NodeKind::Js))?;
                Ok(())
            })
            .expect("corrupt");
        let read = store.read().expect("read");
        let err = export_workspace(&read, ws.id, &ExportOptions::default(), &AtomicBool::new(false))
            .expect_err("corrupt");
        assert!(matches!(err, EngineError::Invariant(_)));
    }

    #[test]
    fn cancelled_export_stops() {
        let (store, ws) = seeded();
        let read = store.read().expect("read");
        let err = export_workspace(&read, ws.id, &ExportOptions::default(), &AtomicBool::new(true))
            .expect_err("cancelled");
        assert!(matches!(err, EngineError::Cancelled));
    }

    #[test]
    fn folder_filter_keeps_subtree_only() {
        let (store, ws) = seeded();
        let folder = |name: &str, parent: Option<Id>| File {
            id: Id::new_now(),
            workspace_id: ws.id,
            parent_id: parent,
            content_id: None,
            content_type: FileKind::Folder,
            name: name.into(),
            order: 0.0,
        };
        let root = folder("root", None);
        let child = folder("child", Some(root.id));
        let grandchild = folder("grandchild", Some(child.id));
        let other = folder("other", None);
        store
            .write_with(|tx| -> EngineResult<()> {
                for f in [&root, &child, &grandchild, &other] {
                    writer::insert::<Files>(tx, f)?;
                }
                Ok(())
            })
            .expect("files");

        let read = store.read().expect("read");
        let options = ExportOptions {
            filter_by_folder_id: Some(child.id),
            ..ExportOptions::default()
        };
        let bundle = export_workspace(&read, ws.id, &options, &AtomicBool::new(false)).expect("export");
        let names: Vec<&str> = bundle.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["child", "grandchild"]);
    }
}
