//! Structural checks run on a bundle before the importer writes anything.
//!
//! - Every edge joins two nodes of its own flow
//! - Every node has exactly one payload, of its own kind
//! - Every delta request points at a base request
//! - The file tree has no cycle

use super::ImportOptions;
use crate::bundle::Bundle;
use crate::error::{EngineError, EngineResult};
use crate::id::Id;
use crate::model::{File, NodeKind};
use std::collections::{BTreeMap, BTreeSet};

pub(super) fn validate(bundle: &Bundle, options: &ImportOptions) -> EngineResult<()> {
    if options.import_flows {
        check_flows(bundle)?;
    }
    if options.import_http {
        check_deltas(bundle, options.preserve_ids)?;
    }
    if options.create_files {
        parents_first(&bundle.files)?;
    }
    Ok(())
}

fn check_flows(bundle: &Bundle) -> EngineResult<()> {
    let flows: BTreeSet<Id> = bundle.flows.iter().map(|f| f.id).collect();
    let node_flow: BTreeMap<Id, Id> = bundle.nodes.iter().map(|n| (n.id, n.flow_id)).collect();

    for node in &bundle.nodes {
        if !flows.contains(&node.flow_id) {
            return Err(EngineError::invariant(format!(
                "node {} belongs to flow {} outside the bundle",
                node.id, node.flow_id
            )));
        }
    }

    for edge in &bundle.edges {
        for end in [edge.source_id, edge.target_id] {
            if node_flow.get(&end) != Some(&edge.flow_id) {
                return Err(EngineError::invariant(format!(
                    "edge {} joins node {} outside flow {}",
                    edge.id, end, edge.flow_id
                )));
            }
        }
    }

    let mut kinds: BTreeMap<Id, Vec<NodeKind>> = BTreeMap::new();
    for payload in bundle.payloads() {
        kinds.entry(payload.node_id()).or_default().push(payload.kind());
    }
    for node in &bundle.nodes {
        match kinds.remove(&node.id).as_deref() {
            Some([kind]) if *kind == node.kind => {}
            Some([kind]) => {
                return Err(EngineError::invariant(format!(
                    "{} node {} carries a {} payload",
                    node.kind, node.id, kind
                )));
            }
            Some(_) => {
                return Err(EngineError::invariant(format!(
                    "node {} has more than one payload",
                    node.id
                )));
            }
            None => {
                return Err(EngineError::invariant(format!(
                    "{} node {} has no payload",
                    node.kind, node.id
                )));
            }
        }
    }
    if let Some(orphan) = kinds.keys().next() {
        return Err(EngineError::invariant(format!("payload for unknown node {orphan}")));
    }
    Ok(())
}

fn check_deltas(bundle: &Bundle, preserve_ids: bool) -> EngineResult<()> {
    for http in bundle.https.iter().filter(|h| h.is_delta) {
        let Some(parent) = http.parent_http_id else {
            return Err(EngineError::invariant(format!(
                "delta request {} has no base",
                http.id
            )));
        };
        match bundle.get_http_by_id(parent) {
            Some(base) if base.is_delta => {
                return Err(EngineError::invariant(format!(
                    "delta request {} is based on delta {}",
                    http.id, parent
                )));
            }
            Some(_) => {}
            // A base outside the bundle can only be the row already stored
            // under the same ID; the importer checks it when writing.
            None if preserve_ids => {}
            None => {
                return Err(EngineError::invariant(format!(
                    "delta request {} is based on {} outside the bundle",
                    http.id, parent
                )));
            }
        }
    }
    Ok(())
}

/// Files ordered so every parent precedes its children.
///
/// A file whose parent is outside the slice counts as a root. A cycle in
/// `parent_id` is invalid input.
pub(super) fn parents_first(files: &[File]) -> EngineResult<Vec<&File>> {
    let present: BTreeSet<Id> = files.iter().map(|f| f.id).collect();
    let mut placed: BTreeSet<Id> = BTreeSet::new();
    let mut out = Vec::with_capacity(files.len());
    let mut pending: Vec<&File> = files.iter().collect();

    while !pending.is_empty() {
        let before = pending.len();
        pending.retain(|f| {
            let ready = f
                .parent_id
                .is_none_or(|p| !present.contains(&p) || placed.contains(&p));
            if ready {
                placed.insert(f.id);
                out.push(*f);
            }
            !ready
        });
        if pending.len() == before {
            return Err(EngineError::validation(
                "files",
                format!("parent cycle through file {}", pending[0].id),
            ));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Edge, FileKind, Flow, Http, Node, NodePayload, NoopKind, NoopNode, Workspace,
    };

    fn flow_bundle() -> (Bundle, Flow, Node) {
        let ws = Workspace::new("v");
        let mut bundle = Bundle::new(ws.clone());
        let flow = Flow::new(ws.id, "f");
        let start = Node::new(flow.id, "Start", NodeKind::NoOp);
        bundle.push_payload(NodePayload::NoOp(NoopNode {
            flow_node_id: start.id,
            kind: NoopKind::Start,
        }));
        bundle.nodes.push(start.clone());
        bundle.flows.push(flow.clone());
        (bundle, flow, start)
    }

    fn file(parent: Option<Id>) -> File {
        File {
            id: Id::new_now(),
            workspace_id: Id::NIL,
            parent_id: parent,
            content_id: None,
            content_type: FileKind::Folder,
            name: "f".into(),
            order: 0.0,
        }
    }

    #[test]
    fn consistent_flow_passes() {
        let (bundle, _, _) = flow_bundle();
        assert!(check_flows(&bundle).is_ok());
    }

    #[test]
    fn edge_into_another_flow_fails() {
        let (mut bundle, flow, start) = flow_bundle();
        let other = Flow::new(flow.workspace_id, "other");
        let stranger = Node::new(other.id, "x", NodeKind::NoOp);
        bundle.edges.push(Edge::then(flow.id, start.id, stranger.id));
        assert!(matches!(check_flows(&bundle), Err(EngineError::Invariant(_))));
    }

    #[test]
    fn payload_of_wrong_kind_fails() {
        let (mut bundle, _, _) = flow_bundle();
        bundle.nodes[0].kind = NodeKind::Js;
        assert!(matches!(check_flows(&bundle), Err(EngineError::Invariant(_))));
    }

    #[test]
    fn missing_payload_fails() {
        let (mut bundle, flow, _) = flow_bundle();
        bundle.nodes.push(Node::new(flow.id, "bare", NodeKind::Condition));
        assert!(matches!(check_flows(&bundle), Err(EngineError::Invariant(_))));
    }

    #[test]
    fn delta_of_delta_fails() {
        let mut bundle = Bundle::new(Workspace::new("d"));
        let base = Http::new(Id::NIL, "b", "GET", "/");
        let delta = Http::delta_of(&base);
        let mut nested = Http::delta_of(&delta);
        nested.parent_http_id = Some(delta.id);
        bundle.https = vec![base, delta, nested];
        assert!(check_deltas(&bundle, false).is_err());
    }

    #[test]
    fn delta_base_outside_bundle_needs_preserved_ids() {
        let mut bundle = Bundle::new(Workspace::new("d"));
        let base = Http::new(Id::NIL, "b", "GET", "/");
        bundle.https = vec![Http::delta_of(&base)];
        assert!(check_deltas(&bundle, false).is_err());
        assert!(check_deltas(&bundle, true).is_ok());
    }

    #[test]
    fn files_come_out_parents_first() {
        let root = file(None);
        let child = file(Some(root.id));
        let grandchild = file(Some(child.id));
        let input = vec![grandchild.clone(), child.clone(), root.clone()];
        let ordered: Vec<Id> = parents_first(&input).expect("order").iter().map(|f| f.id).collect();
        assert_eq!(ordered, vec![root.id, child.id, grandchild.id]);
    }

    #[test]
    fn file_cycle_is_invalid() {
        let mut a = file(None);
        let b = file(Some(a.id));
        a.parent_id = Some(b.id);
        let err = parents_first(&[a, b]).expect_err("cycle");
        assert!(matches!(err, EngineError::Validation { field: "files", .. }));
    }
}
