//! # Bundle Filter
//!
//! Trims a bundle down to a selection before import.
//!
//! [`filter_by_examples`] keeps the requested examples and a minimal flow
//! around each of them: one start node, one request node per example, one
//! `then` edge from start to each request node. When no request node in the
//! bundle references the selection, a fresh flow is synthesised for every
//! selected example instead.
//!
//! [`filter_by_flows`] keeps whole flows together with everything their
//! nodes reference.
//!
//! Both passes then cut the collection tree to the retained examples: their
//! endpoints, the folders above those endpoints, their collections, and the
//! example and response sub-rows.

use crate::bundle::Bundle;
use crate::id::Id;
use crate::model::{
    Edge, Flow, Node, NodeKind, NodePayload, NoopKind, NoopNode, RequestNode,
};
use crate::primitives::START_NODE_NAME;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("filter selection is empty")]
    EmptySelection,

    /// No requested example is in the bundle, by reference or standalone.
    /// Carries the first requested ID.
    #[error("no requested example found, first requested: {0}")]
    NoMatchingExamples(Id),

    #[error("no requested flow found, first requested: {0}")]
    NoMatchingFlows(Id),

    #[error("flow {0} has no start node")]
    MissingStart(Id),
}

// =============================================================================
// BY EXAMPLES
// =============================================================================

/// Keep only `requested` examples, each reachable from a start node.
pub fn filter_by_examples(bundle: &mut Bundle, requested: &BTreeSet<Id>) -> Result<(), FilterError> {
    let Some(&first) = requested.first() else {
        return Err(FilterError::EmptySelection);
    };

    let node_flow: BTreeMap<Id, Id> = bundle.nodes.iter().map(|n| (n.id, n.flow_id)).collect();
    let mut kept: BTreeMap<Id, Vec<Id>> = BTreeMap::new();
    // One request node per (flow, requested example); the first in bundle order wins.
    let mut claimed: BTreeSet<(Id, Id)> = BTreeSet::new();
    for request in &bundle.request_nodes {
        if !request.references_any(requested) {
            continue;
        }
        let Some(&flow) = node_flow.get(&request.flow_node_id) else {
            continue;
        };
        let mut claims = false;
        for example in [request.example_id, request.delta_example_id].into_iter().flatten() {
            if requested.contains(&example) {
                claims |= claimed.insert((flow, example));
            }
        }
        if claims {
            kept.entry(flow).or_default().push(request.flow_node_id);
        }
    }

    if kept.is_empty() {
        debug!(requested = requested.len(), "no request node references the selection");
        flowless(bundle, requested, first)?;
    } else {
        through_request_nodes(bundle, requested, &kept)?;
    }

    let examples: BTreeSet<Id> = bundle
        .request_nodes
        .iter()
        .flat_map(|r| [r.example_id, r.delta_example_id])
        .flatten()
        .collect();
    retain_example_tree(bundle, &examples, &referenced_endpoints(bundle));

    info!(
        flows = bundle.flows.len(),
        examples = bundle.examples.len(),
        "bundle filtered by examples"
    );
    Ok(())
}

fn through_request_nodes(
    bundle: &mut Bundle,
    requested: &BTreeSet<Id>,
    kept: &BTreeMap<Id, Vec<Id>>,
) -> Result<(), FilterError> {
    let mut starts = BTreeMap::new();
    for flow in kept.keys() {
        let start = bundle.start_node(*flow).ok_or(FilterError::MissingStart(*flow))?;
        starts.insert(*flow, start.id);
    }

    let mut keep_nodes: BTreeSet<Id> = starts.values().copied().collect();
    let mut edges = Vec::new();
    for (flow, nodes) in kept {
        let start = starts[flow];
        for node in nodes {
            // two references to the same node from one flow still get one edge
            if keep_nodes.insert(*node) {
                edges.push(Edge::then(*flow, start, *node));
            }
        }
    }

    let first_flow = bundle
        .flows
        .iter()
        .map(|f| f.id)
        .find(|id| kept.contains_key(id));

    bundle.flows.retain(|f| kept.contains_key(&f.id));
    bundle.flow_variables.retain(|v| kept.contains_key(&v.flow_id));
    bundle.nodes.retain(|n| keep_nodes.contains(&n.id));
    bundle.retain_payloads(|id| keep_nodes.contains(&id));
    bundle.edges = edges;

    // Requested examples nothing points at join the first retained flow.
    let reached: BTreeSet<Id> = bundle
        .request_nodes
        .iter()
        .flat_map(|r| [r.example_id, r.delta_example_id])
        .flatten()
        .collect();
    let orphans: Vec<(Id, Id, String)> = bundle
        .examples
        .iter()
        .filter(|e| requested.contains(&e.id) && !reached.contains(&e.id))
        .map(|e| (e.id, e.item_api_id, e.name.clone()))
        .collect();
    if let Some(flow) = first_flow {
        let start = starts[&flow];
        for (example, endpoint, name) in orphans {
            let node = Node::new(flow, request_name(&name), NodeKind::Request);
            bundle.push_payload(request_payload(node.id, endpoint, example));
            bundle.edges.push(Edge::then(flow, start, node.id));
            bundle.nodes.push(node);
        }
    }
    Ok(())
}

/// One synthesised flow per requested example.
fn flowless(bundle: &mut Bundle, requested: &BTreeSet<Id>, first: Id) -> Result<(), FilterError> {
    bundle.examples.retain(|e| requested.contains(&e.id));
    if bundle.examples.is_empty() {
        return Err(FilterError::NoMatchingExamples(first));
    }

    bundle.flows.clear();
    bundle.flow_variables.clear();
    bundle.nodes.clear();
    bundle.edges.clear();
    bundle.retain_payloads(|_| false);

    let workspace_id = bundle.workspace.id;
    let examples: Vec<(Id, Id, String)> = bundle
        .examples
        .iter()
        .map(|e| (e.id, e.item_api_id, e.name.clone()))
        .collect();
    for (i, (example, endpoint, name)) in examples.into_iter().enumerate() {
        let flow_name = if name.is_empty() {
            format!("Example {}", i + 1)
        } else {
            name.clone()
        };
        let flow = Flow::new(workspace_id, flow_name);
        let start = Node::new(flow.id, START_NODE_NAME, NodeKind::NoOp);
        let request = Node::new(flow.id, request_name(&name), NodeKind::Request);

        bundle.push_payload(NodePayload::NoOp(NoopNode {
            flow_node_id: start.id,
            kind: NoopKind::Start,
        }));
        bundle.push_payload(request_payload(request.id, endpoint, example));
        bundle.edges.push(Edge::then(flow.id, start.id, request.id));
        bundle.nodes.push(start);
        bundle.nodes.push(request);
        bundle.flows.push(flow);
    }
    Ok(())
}

fn request_name(example_name: &str) -> String {
    if example_name.is_empty() {
        "Request".to_string()
    } else {
        example_name.to_string()
    }
}

fn request_payload(node: Id, endpoint: Id, example: Id) -> NodePayload {
    NodePayload::Request(RequestNode {
        flow_node_id: node,
        endpoint_id: Some(endpoint),
        example_id: Some(example),
        ..RequestNode::default()
    })
}

// =============================================================================
// BY FLOWS
// =============================================================================

/// Keep only `requested` flows and what their nodes reference.
pub fn filter_by_flows(bundle: &mut Bundle, requested: &BTreeSet<Id>) -> Result<(), FilterError> {
    let Some(&first) = requested.first() else {
        return Err(FilterError::EmptySelection);
    };
    bundle.flows.retain(|f| requested.contains(&f.id));
    if bundle.flows.is_empty() {
        return Err(FilterError::NoMatchingFlows(first));
    }
    let flows: BTreeSet<Id> = bundle.flows.iter().map(|f| f.id).collect();

    bundle.flow_variables.retain(|v| flows.contains(&v.flow_id));
    bundle.nodes.retain(|n| flows.contains(&n.flow_id));
    bundle.edges.retain(|e| flows.contains(&e.flow_id));
    let nodes: BTreeSet<Id> = bundle.nodes.iter().map(|n| n.id).collect();
    bundle.retain_payloads(|id| nodes.contains(&id));

    let references: BTreeSet<Id> = bundle
        .request_nodes
        .iter()
        .flat_map(|r| [r.endpoint_id, r.example_id, r.delta_endpoint_id, r.delta_example_id])
        .flatten()
        .collect();
    retain_example_tree(bundle, &references, &references);

    // Request references may name HTTP requests directly; keep their bases.
    let mut https: BTreeSet<Id> = bundle
        .https
        .iter()
        .filter(|h| references.contains(&h.id))
        .map(|h| h.id)
        .collect();
    let bases: Vec<Id> = bundle
        .https
        .iter()
        .filter(|h| https.contains(&h.id))
        .filter_map(|h| h.parent_http_id)
        .collect();
    https.extend(bases);
    retain_https(bundle, &https);

    let credentials: BTreeSet<Id> = bundle
        .ai_provider_nodes
        .iter()
        .filter_map(|p| p.credential_id)
        .collect();
    bundle.credentials.retain(|c| credentials.contains(&c.id));
    bundle.credential_secrets.retain(|s| credentials.contains(&s.credential_id));

    let content: BTreeSet<Id> = flows.iter().chain(&https).chain(&credentials).copied().collect();
    retain_files(bundle, &content);

    info!(
        flows = bundle.flows.len(),
        nodes = bundle.nodes.len(),
        examples = bundle.examples.len(),
        https = bundle.https.len(),
        "bundle filtered by flows"
    );
    Ok(())
}

// =============================================================================
// TRIMMING
// =============================================================================

fn referenced_endpoints(bundle: &Bundle) -> BTreeSet<Id> {
    bundle
        .request_nodes
        .iter()
        .flat_map(|r| [r.endpoint_id, r.delta_endpoint_id])
        .flatten()
        .collect()
}

/// Cut the collection tree down to `examples` plus `endpoints`.
fn retain_example_tree(bundle: &mut Bundle, examples: &BTreeSet<Id>, endpoints: &BTreeSet<Id>) {
    bundle.examples.retain(|e| examples.contains(&e.id));

    let mut endpoint_ids: BTreeSet<Id> = bundle.examples.iter().map(|e| e.item_api_id).collect();
    endpoint_ids.extend(endpoints.iter().copied());
    bundle.endpoints.retain(|e| endpoint_ids.contains(&e.id));

    let mut collections: BTreeSet<Id> = bundle.examples.iter().map(|e| e.collection_id).collect();
    collections.extend(bundle.endpoints.iter().map(|e| e.collection_id));

    let parents: BTreeMap<Id, Option<Id>> = bundle.folders.iter().map(|f| (f.id, f.parent_id)).collect();
    let mut folders = BTreeSet::new();
    for mut cursor in bundle.endpoints.iter().map(|e| e.folder_id) {
        while let Some(folder) = cursor {
            if !folders.insert(folder) {
                break;
            }
            cursor = parents.get(&folder).copied().flatten();
        }
    }
    bundle.folders.retain(|f| folders.contains(&f.id));
    bundle.collections.retain(|c| collections.contains(&c.id));

    let examples: BTreeSet<Id> = bundle.examples.iter().map(|e| e.id).collect();
    bundle.example_headers.retain(|r| examples.contains(&r.example_id));
    bundle.example_queries.retain(|r| examples.contains(&r.example_id));
    bundle.example_asserts.retain(|r| examples.contains(&r.example_id));
    bundle.example_body_forms.retain(|r| examples.contains(&r.example_id));
    bundle.example_body_urlencoded.retain(|r| examples.contains(&r.example_id));
    bundle.example_body_raws.retain(|r| examples.contains(&r.example_id));
    bundle.responses.retain(|r| examples.contains(&r.example_id));

    let responses: BTreeSet<Id> = bundle.responses.iter().map(|r| r.id).collect();
    bundle.response_headers.retain(|r| responses.contains(&r.response_id));
    bundle.response_asserts.retain(|r| responses.contains(&r.response_id));
}

fn retain_https(bundle: &mut Bundle, https: &BTreeSet<Id>) {
    bundle.https.retain(|h| https.contains(&h.id));
    bundle.http_headers.retain(|r| https.contains(&r.http_id));
    bundle.http_search_params.retain(|r| https.contains(&r.http_id));
    bundle.http_body_forms.retain(|r| https.contains(&r.http_id));
    bundle.http_body_urlencoded.retain(|r| https.contains(&r.http_id));
    bundle.http_body_raws.retain(|r| https.contains(&r.http_id));
    bundle.http_asserts.retain(|r| https.contains(&r.http_id));
}

/// Keep files whose content survived, plus the folders above them.
fn retain_files(bundle: &mut Bundle, content: &BTreeSet<Id>) {
    let parents: BTreeMap<Id, Option<Id>> = bundle.files.iter().map(|f| (f.id, f.parent_id)).collect();
    let mut keep = BTreeSet::new();
    for file in bundle.files.iter().filter(|f| f.content_id.is_some_and(|c| content.contains(&c))) {
        let mut cursor = Some(file.id);
        while let Some(id) = cursor {
            if !keep.insert(id) {
                break;
            }
            cursor = parents.get(&id).copied().flatten();
        }
    }
    bundle.files.retain(|f| keep.contains(&f.id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Collection, Endpoint, Example, ExampleKeyValue, File, FileKind, Http, Workspace,
    };

    struct Fixture {
        bundle: Bundle,
        flow: Id,
        examples: Vec<Id>,
        requests: Vec<Id>,
    }

    /// Start -> Req1 -> Req2, each request bound to its own example.
    fn chain() -> Fixture {
        let ws = Workspace::new("filter");
        let mut bundle = Bundle::new(ws.clone());
        let collection = Collection {
            id: Id::new_now(),
            workspace_id: ws.id,
            name: "c".into(),
            updated: 0,
        };
        let endpoint = Endpoint {
            id: Id::new_now(),
            collection_id: collection.id,
            folder_id: None,
            name: "e".into(),
            url: "/".into(),
            method: "GET".into(),
            prev: None,
            next: None,
        };
        let flow = Flow::new(ws.id, "f");
        let start = Node::new(flow.id, START_NODE_NAME, NodeKind::NoOp);
        bundle.push_payload(NodePayload::NoOp(NoopNode {
            flow_node_id: start.id,
            kind: NoopKind::Start,
        }));

        let mut examples = Vec::new();
        let mut requests = Vec::new();
        let mut previous = start.id;
        for i in 0..2 {
            let example = Example::new(&endpoint, format!("ex{i}"));
            bundle.example_headers.push(ExampleKeyValue {
                id: Id::new_now(),
                example_id: example.id,
                key: "k".into(),
                value: "v".into(),
                description: String::new(),
                enable: true,
                display_order: 0.0,
            });
            let node = Node::new(flow.id, format!("req{i}"), NodeKind::Request);
            bundle.push_payload(request_payload(node.id, endpoint.id, example.id));
            bundle.edges.push(Edge::then(flow.id, previous, node.id));
            previous = node.id;
            examples.push(example.id);
            requests.push(node.id);
            bundle.examples.push(example);
            bundle.nodes.push(node);
        }
        bundle.nodes.insert(0, start);
        bundle.flows.push(flow.clone());
        bundle.endpoints.push(endpoint);
        bundle.collections.push(collection);
        Fixture {
            bundle,
            flow: flow.id,
            examples,
            requests,
        }
    }

    #[test]
    fn keeps_only_the_requested_request_node() {
        let mut fx = chain();
        filter_by_examples(&mut fx.bundle, &BTreeSet::from([fx.examples[0]])).expect("filter");

        let b = &fx.bundle;
        assert_eq!(b.flows.len(), 1);
        let ids: BTreeSet<Id> = b.nodes.iter().map(|n| n.id).collect();
        assert!(ids.contains(&fx.requests[0]));
        assert!(!ids.contains(&fx.requests[1]));
        assert_eq!(b.edges.len(), 1);
        let start = b.start_node(fx.flow).expect("start");
        assert_eq!(b.edges[0].source_id, start.id);
        assert_eq!(b.edges[0].target_id, fx.requests[0]);
        assert_eq!(b.examples.len(), 1);
        assert_eq!(b.example_headers.len(), 1);
        assert_eq!(b.example_headers[0].example_id, fx.examples[0]);
    }

    #[test]
    fn second_node_for_the_same_example_is_dropped() {
        let mut fx = chain();
        let twin = Node::new(fx.flow, "twin", NodeKind::Request);
        let endpoint = fx.bundle.endpoints[0].id;
        fx.bundle.push_payload(request_payload(twin.id, endpoint, fx.examples[0]));
        fx.bundle.edges.push(Edge::then(fx.flow, fx.requests[1], twin.id));
        fx.bundle.nodes.push(twin.clone());

        filter_by_examples(&mut fx.bundle, &BTreeSet::from([fx.examples[0]])).expect("filter");
        let b = &fx.bundle;
        assert_eq!(b.request_nodes.len(), 1);
        assert_eq!(b.request_nodes[0].flow_node_id, fx.requests[0]);
        assert!(b.get_node_by_id(twin.id).is_none());
        assert_eq!(b.edges.len(), 1);
    }

    #[test]
    fn flow_without_start_fails() {
        let mut fx = chain();
        fx.bundle.noop_nodes.clear();
        let err = filter_by_examples(&mut fx.bundle, &BTreeSet::from([fx.examples[0]]))
            .expect_err("missing start");
        assert_eq!(err, FilterError::MissingStart(fx.flow));
    }

    #[test]
    fn unreferenced_example_joins_first_flow() {
        let mut fx = chain();
        let endpoint = fx.bundle.endpoints[0].clone();
        let loose = Example::new(&endpoint, "loose");
        let loose_id = loose.id;
        fx.bundle.examples.push(loose);

        filter_by_examples(&mut fx.bundle, &BTreeSet::from([fx.examples[0], loose_id])).expect("filter");
        let b = &fx.bundle;
        assert_eq!(b.request_nodes.len(), 2);
        assert!(b.request_nodes.iter().any(|r| r.example_id == Some(loose_id)));
        assert_eq!(b.edges.len(), 2);
        assert_eq!(b.examples.len(), 2);
    }

    #[test]
    fn flowless_selection_synthesises_flows() {
        let mut fx = chain();
        fx.bundle.flows.clear();
        fx.bundle.nodes.clear();
        fx.bundle.edges.clear();
        fx.bundle.retain_payloads(|_| false);
        fx.bundle.examples[1].name.clear();

        filter_by_examples(&mut fx.bundle, &BTreeSet::from([fx.examples[1]])).expect("filter");
        let b = &fx.bundle;
        assert_eq!(b.flows.len(), 1);
        assert_eq!(b.flows[0].name, "Example 1");
        assert_eq!(b.nodes.len(), 2);
        assert_eq!(b.request_nodes[0].example_id, Some(fx.examples[1]));
        assert!(b.start_node(b.flows[0].id).is_some());
        assert_eq!(b.edges.len(), 1);
    }

    #[test]
    fn unknown_examples_are_not_found() {
        let mut fx = chain();
        let ghost = Id::new_now();
        let err = filter_by_examples(&mut fx.bundle, &BTreeSet::from([ghost])).expect_err("no match");
        assert_eq!(err, FilterError::NoMatchingExamples(ghost));
    }

    #[test]
    fn empty_selection_is_rejected() {
        let mut fx = chain();
        assert_eq!(
            filter_by_examples(&mut fx.bundle, &BTreeSet::new()),
            Err(FilterError::EmptySelection)
        );
        assert_eq!(
            filter_by_flows(&mut fx.bundle, &BTreeSet::new()),
            Err(FilterError::EmptySelection)
        );
    }

    #[test]
    fn by_flows_keeps_references_and_drops_the_rest() {
        let mut fx = chain();
        let ws = fx.bundle.workspace.id;
        let other = Flow::new(ws, "other");
        let base = Http::new(ws, "unused", "GET", "/unused");
        let flow_file = File {
            id: Id::new_now(),
            workspace_id: ws,
            parent_id: None,
            content_id: Some(fx.flow),
            content_type: FileKind::Flow,
            name: "f".into(),
            order: 0.0,
        };
        let other_file = File {
            id: Id::new_now(),
            content_id: Some(other.id),
            ..flow_file.clone()
        };
        fx.bundle.files = vec![flow_file.clone(), other_file];
        fx.bundle.flows.push(other);
        fx.bundle.https.push(base);

        filter_by_flows(&mut fx.bundle, &BTreeSet::from([fx.flow])).expect("filter");
        let b = &fx.bundle;
        assert_eq!(b.flows.len(), 1);
        assert_eq!(b.nodes.len(), 3);
        assert_eq!(b.edges.len(), 2);
        assert_eq!(b.examples.len(), 2);
        assert_eq!(b.endpoints.len(), 1);
        assert!(b.https.is_empty());
        assert_eq!(b.files, vec![flow_file]);
    }

    #[test]
    fn unknown_flows_are_not_found() {
        let mut fx = chain();
        let ghost = Id::new_now();
        assert_eq!(
            filter_by_flows(&mut fx.bundle, &BTreeSet::from([ghost])),
            Err(FilterError::NoMatchingFlows(ghost))
        );
    }
}
