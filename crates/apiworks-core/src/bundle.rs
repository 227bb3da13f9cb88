//! # Bundle Model
//!
//! A bundle is the self-contained snapshot of one workspace that export
//! produces and import consumes: the workspace header plus one vector per
//! entity kind.
//!
//! Lookups are linear scans. A bundle only lives for the duration of one
//! export or import, so it carries no indices to keep in sync while the
//! filter and layout passes rewrite it.

use crate::id::Id;
use crate::model::{
    AiMemoryNode, AiNode, AiProviderNode, Collection, ConditionNode, Credential, CredentialSecret,
    Edge, Endpoint, Environment, Example, ExampleAssert, ExampleBodyRaw, ExampleKeyValue, File,
    Flow, FlowVariable, Folder, ForEachNode, ForNode, Http, HttpAssert, HttpBodyRaw, HttpKeyValue,
    JsNode, Node, NodePayload, NoopNode, RequestNode, Response, ResponseAssert, ResponseHeader,
    Variable, Workspace,
};
use crate::primitives::BUNDLE_FORMAT_VERSION;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every entity of one workspace, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bundle {
    pub format_version: u32,
    pub workspace: Workspace,

    // collections
    pub collections: Vec<Collection>,
    pub folders: Vec<Folder>,
    pub endpoints: Vec<Endpoint>,
    pub examples: Vec<Example>,
    pub example_headers: Vec<ExampleKeyValue>,
    pub example_queries: Vec<ExampleKeyValue>,
    pub example_asserts: Vec<ExampleAssert>,
    pub example_body_forms: Vec<ExampleKeyValue>,
    pub example_body_urlencoded: Vec<ExampleKeyValue>,
    pub example_body_raws: Vec<ExampleBodyRaw>,
    pub responses: Vec<Response>,
    pub response_headers: Vec<ResponseHeader>,
    pub response_asserts: Vec<ResponseAssert>,

    // http
    pub https: Vec<Http>,
    pub http_headers: Vec<HttpKeyValue>,
    pub http_search_params: Vec<HttpKeyValue>,
    pub http_body_forms: Vec<HttpKeyValue>,
    pub http_body_urlencoded: Vec<HttpKeyValue>,
    pub http_body_raws: Vec<HttpBodyRaw>,
    pub http_asserts: Vec<HttpAssert>,

    pub files: Vec<File>,

    // flows
    pub flows: Vec<Flow>,
    pub flow_variables: Vec<FlowVariable>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub noop_nodes: Vec<NoopNode>,
    pub request_nodes: Vec<RequestNode>,
    pub condition_nodes: Vec<ConditionNode>,
    pub for_nodes: Vec<ForNode>,
    pub for_each_nodes: Vec<ForEachNode>,
    pub js_nodes: Vec<JsNode>,
    pub ai_nodes: Vec<AiNode>,
    pub ai_provider_nodes: Vec<AiProviderNode>,
    pub ai_memory_nodes: Vec<AiMemoryNode>,

    // environments
    pub environments: Vec<Environment>,
    pub variables: Vec<Variable>,

    // credentials (secrets stay sealed)
    pub credentials: Vec<Credential>,
    pub credential_secrets: Vec<CredentialSecret>,
}

impl Bundle {
    /// An empty bundle for `workspace`.
    #[must_use]
    pub fn new(workspace: Workspace) -> Self {
        Self {
            format_version: BUNDLE_FORMAT_VERSION,
            workspace,
            ..Self::default()
        }
    }

    /// Entity count per kind, keyed by the field name of the kind.
    #[must_use]
    pub fn count_entities(&self) -> BTreeMap<&'static str, usize> {
        BTreeMap::from([
            ("collections", self.collections.len()),
            ("folders", self.folders.len()),
            ("endpoints", self.endpoints.len()),
            ("examples", self.examples.len()),
            ("example_headers", self.example_headers.len()),
            ("example_queries", self.example_queries.len()),
            ("example_asserts", self.example_asserts.len()),
            ("example_body_forms", self.example_body_forms.len()),
            ("example_body_urlencoded", self.example_body_urlencoded.len()),
            ("example_body_raws", self.example_body_raws.len()),
            ("responses", self.responses.len()),
            ("response_headers", self.response_headers.len()),
            ("response_asserts", self.response_asserts.len()),
            ("https", self.https.len()),
            ("http_headers", self.http_headers.len()),
            ("http_search_params", self.http_search_params.len()),
            ("http_body_forms", self.http_body_forms.len()),
            ("http_body_urlencoded", self.http_body_urlencoded.len()),
            ("http_body_raws", self.http_body_raws.len()),
            ("http_asserts", self.http_asserts.len()),
            ("files", self.files.len()),
            ("flows", self.flows.len()),
            ("flow_variables", self.flow_variables.len()),
            ("nodes", self.nodes.len()),
            ("edges", self.edges.len()),
            ("noop_nodes", self.noop_nodes.len()),
            ("request_nodes", self.request_nodes.len()),
            ("condition_nodes", self.condition_nodes.len()),
            ("for_nodes", self.for_nodes.len()),
            ("for_each_nodes", self.for_each_nodes.len()),
            ("js_nodes", self.js_nodes.len()),
            ("ai_nodes", self.ai_nodes.len()),
            ("ai_provider_nodes", self.ai_provider_nodes.len()),
            ("ai_memory_nodes", self.ai_memory_nodes.len()),
            ("environments", self.environments.len()),
            ("variables", self.variables.len()),
            ("credentials", self.credentials.len()),
            ("credential_secrets", self.credential_secrets.len()),
        ])
    }

    /// Sum of every entity count.
    #[must_use]
    pub fn total_entities(&self) -> usize {
        self.count_entities().values().sum()
    }

    // =========================================================================
    // LOOKUPS
    // =========================================================================

    pub fn get_http_by_id(&self, id: Id) -> Option<&Http> {
        self.https.iter().find(|h| h.id == id)
    }

    pub fn get_http_by_name(&self, name: &str) -> Option<&Http> {
        self.https.iter().find(|h| h.name == name)
    }

    pub fn get_flow_by_id(&self, id: Id) -> Option<&Flow> {
        self.flows.iter().find(|f| f.id == id)
    }

    pub fn get_flow_by_name(&self, name: &str) -> Option<&Flow> {
        self.flows.iter().find(|f| f.name == name)
    }

    pub fn get_node_by_id(&self, id: Id) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn get_node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn get_file_by_id(&self, id: Id) -> Option<&File> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn get_file_by_name(&self, name: &str) -> Option<&File> {
        self.files.iter().find(|f| f.name == name)
    }

    pub fn get_file_by_content_id(&self, content_id: Id) -> Option<&File> {
        self.files.iter().find(|f| f.content_id == Some(content_id))
    }

    pub fn get_env_by_id(&self, id: Id) -> Option<&Environment> {
        self.environments.iter().find(|e| e.id == id)
    }

    pub fn get_env_by_name(&self, name: &str) -> Option<&Environment> {
        self.environments.iter().find(|e| e.name == name)
    }

    /// Nodes of `flow_id`, in bundle order.
    pub fn nodes_of(&self, flow_id: Id) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.flow_id == flow_id)
    }

    /// Edges of `flow_id`, in bundle order.
    pub fn edges_of(&self, flow_id: Id) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.flow_id == flow_id)
    }

    /// The start node of `flow_id`: a no-op node whose payload is `start`.
    pub fn start_node(&self, flow_id: Id) -> Option<&Node> {
        self.nodes_of(flow_id).find(|n| {
            self.noop_nodes
                .iter()
                .any(|p| p.flow_node_id == n.id && p.is_start())
        })
    }

    // =========================================================================
    // NODE PAYLOADS
    // =========================================================================

    /// The payload row of `node_id`, whatever its kind.
    pub fn payload_for(&self, node_id: Id) -> Option<NodePayload> {
        fn pick<T: Clone>(rows: &[T], id: Id, key: impl Fn(&T) -> Id) -> Option<T> {
            rows.iter().find(|r| key(r) == id).cloned()
        }

        pick(&self.noop_nodes, node_id, |p| p.flow_node_id)
            .map(NodePayload::NoOp)
            .or_else(|| pick(&self.request_nodes, node_id, |p| p.flow_node_id).map(NodePayload::Request))
            .or_else(|| pick(&self.condition_nodes, node_id, |p| p.flow_node_id).map(NodePayload::Condition))
            .or_else(|| pick(&self.for_nodes, node_id, |p| p.flow_node_id).map(NodePayload::For))
            .or_else(|| pick(&self.for_each_nodes, node_id, |p| p.flow_node_id).map(NodePayload::ForEach))
            .or_else(|| pick(&self.js_nodes, node_id, |p| p.flow_node_id).map(NodePayload::Js))
            .or_else(|| pick(&self.ai_nodes, node_id, |p| p.flow_node_id).map(NodePayload::Ai))
            .or_else(|| pick(&self.ai_provider_nodes, node_id, |p| p.flow_node_id).map(NodePayload::AiProvider))
            .or_else(|| pick(&self.ai_memory_nodes, node_id, |p| p.flow_node_id).map(NodePayload::AiMemory))
    }

    /// Every payload row, whatever its kind.
    pub fn payloads(&self) -> Vec<NodePayload> {
        let mut out = Vec::new();
        out.extend(self.noop_nodes.iter().cloned().map(NodePayload::NoOp));
        out.extend(self.request_nodes.iter().cloned().map(NodePayload::Request));
        out.extend(self.condition_nodes.iter().cloned().map(NodePayload::Condition));
        out.extend(self.for_nodes.iter().cloned().map(NodePayload::For));
        out.extend(self.for_each_nodes.iter().cloned().map(NodePayload::ForEach));
        out.extend(self.js_nodes.iter().cloned().map(NodePayload::Js));
        out.extend(self.ai_nodes.iter().cloned().map(NodePayload::Ai));
        out.extend(self.ai_provider_nodes.iter().cloned().map(NodePayload::AiProvider));
        out.extend(self.ai_memory_nodes.iter().cloned().map(NodePayload::AiMemory));
        out
    }

    /// Append a payload to the slice of its kind.
    pub fn push_payload(&mut self, payload: NodePayload) {
        match payload {
            NodePayload::NoOp(p) => self.noop_nodes.push(p),
            NodePayload::Request(p) => self.request_nodes.push(p),
            NodePayload::Condition(p) => self.condition_nodes.push(p),
            NodePayload::For(p) => self.for_nodes.push(p),
            NodePayload::ForEach(p) => self.for_each_nodes.push(p),
            NodePayload::Js(p) => self.js_nodes.push(p),
            NodePayload::Ai(p) => self.ai_nodes.push(p),
            NodePayload::AiProvider(p) => self.ai_provider_nodes.push(p),
            NodePayload::AiMemory(p) => self.ai_memory_nodes.push(p),
        }
    }

    /// Drop every payload row whose node fails `keep`.
    pub fn retain_payloads(&mut self, keep: impl Fn(Id) -> bool) {
        self.noop_nodes.retain(|p| keep(p.flow_node_id));
        self.request_nodes.retain(|p| keep(p.flow_node_id));
        self.condition_nodes.retain(|p| keep(p.flow_node_id));
        self.for_nodes.retain(|p| keep(p.flow_node_id));
        self.for_each_nodes.retain(|p| keep(p.flow_node_id));
        self.js_nodes.retain(|p| keep(p.flow_node_id));
        self.ai_nodes.retain(|p| keep(p.flow_node_id));
        self.ai_provider_nodes.retain(|p| keep(p.flow_node_id));
        self.ai_memory_nodes.retain(|p| keep(p.flow_node_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeKind, NoopKind};

    fn flow_with_start() -> (Bundle, Flow, Node) {
        let ws = Workspace::new("w");
        let mut bundle = Bundle::new(ws.clone());
        let flow = Flow::new(ws.id, "f");
        let start = Node::new(flow.id, "Start", NodeKind::NoOp);
        bundle.flows.push(flow.clone());
        bundle.nodes.push(start.clone());
        bundle.push_payload(NodePayload::NoOp(NoopNode {
            flow_node_id: start.id,
            kind: NoopKind::Start,
        }));
        (bundle, flow, start)
    }

    #[test]
    fn new_bundle_is_current_version_and_empty() {
        let bundle = Bundle::new(Workspace::new("w"));
        assert_eq!(bundle.format_version, BUNDLE_FORMAT_VERSION);
        assert_eq!(bundle.total_entities(), 0);
    }

    #[test]
    fn counts_follow_slices() {
        let (bundle, _, _) = flow_with_start();
        let counts = bundle.count_entities();
        assert_eq!(counts["flows"], 1);
        assert_eq!(counts["nodes"], 1);
        assert_eq!(counts["noop_nodes"], 1);
        assert_eq!(counts["edges"], 0);
        assert_eq!(bundle.total_entities(), 3);
    }

    #[test]
    fn lookups_by_id_and_name() {
        let (bundle, flow, start) = flow_with_start();
        assert_eq!(bundle.get_flow_by_id(flow.id), Some(&flow));
        assert_eq!(bundle.get_flow_by_name("f"), Some(&flow));
        assert_eq!(bundle.get_node_by_name("Start"), Some(&start));
        assert!(bundle.get_http_by_id(Id::new_now()).is_none());
    }

    #[test]
    fn start_node_requires_start_payload() {
        let (mut bundle, flow, start) = flow_with_start();
        assert_eq!(bundle.start_node(flow.id).map(|n| n.id), Some(start.id));

        bundle.noop_nodes[0].kind = NoopKind::Unspecified;
        assert!(bundle.start_node(flow.id).is_none());
    }

    #[test]
    fn payload_lookup_dispatches_on_kind() {
        let (mut bundle, flow, start) = flow_with_start();
        let js = Node::new(flow.id, "script", NodeKind::Js);
        bundle.push_payload(NodePayload::Js(JsNode {
            flow_node_id: js.id,
            code: b"1+1".to_vec(),
            compress_type: crate::model::CompressType::None,
        }));

        assert_eq!(bundle.payload_for(start.id).map(|p| p.kind()), Some(NodeKind::NoOp));
        assert_eq!(bundle.payload_for(js.id).map(|p| p.kind()), Some(NodeKind::Js));

        bundle.retain_payloads(|id| id != js.id);
        assert!(bundle.payload_for(js.id).is_none());
    }
}
