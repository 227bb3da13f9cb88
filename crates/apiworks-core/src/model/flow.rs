//! # Flows
//!
//! A flow is a directed graph of nodes connected by edges. Every node has
//! exactly one payload row whose kind matches `Node::kind`, keyed by the
//! node's ID; [`NodePayload`] is the tagged sum over those payloads.
//!
//! Each flow has exactly one start node: a `no_op` node whose payload kind
//! is `start`.

use super::{CompressType, coded_enum};
use crate::id::Id;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    pub id: Id,
    pub workspace_id: Id,
    pub name: String,
    pub version_parent_id: Option<Id>,
    /// Duration of the last run in milliseconds.
    pub duration: i32,
}

impl Flow {
    #[must_use]
    pub fn new(workspace_id: Id, name: impl Into<String>) -> Self {
        Self {
            id: Id::new_now(),
            workspace_id,
            name: name.into(),
            version_parent_id: None,
            duration: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowVariable {
    pub id: Id,
    pub flow_id: Id,
    pub name: String,
    pub value: String,
    pub enabled: bool,
    pub description: String,
    pub display_order: f64,
}

coded_enum! {
    pub enum NodeKind {
        #[default]
        NoOp = 0 => "no_op",
        Request = 1 => "request",
        Condition = 2 => "condition",
        For = 3 => "for",
        ForEach = 4 => "for_each",
        Js = 5 => "js",
        Ai = 6 => "ai",
        AiProvider = 7 => "ai_provider",
        AiMemory = 8 => "ai_memory",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: Id,
    pub flow_id: Id,
    pub name: String,
    pub kind: NodeKind,
    pub position_x: f64,
    pub position_y: f64,
}

impl Node {
    #[must_use]
    pub fn new(flow_id: Id, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: Id::new_now(),
            flow_id,
            name: name.into(),
            kind,
            position_x: 0.0,
            position_y: 0.0,
        }
    }
}

coded_enum! {
    /// Output handle of the source node an edge leaves from.
    pub enum EdgeHandle {
        #[default]
        Unspecified = 0 => "unspecified",
        Then = 1 => "then",
        Else = 2 => "else",
        Loop = 3 => "loop",
    }
}

coded_enum! {
    pub enum EdgeKind {
        #[default]
        Unspecified = 0 => "unspecified",
        NoOp = 1 => "no_op",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: Id,
    pub flow_id: Id,
    pub source_id: Id,
    pub target_id: Id,
    pub source_handler: EdgeHandle,
    pub kind: EdgeKind,
}

impl Edge {
    /// A fresh `then` edge between two nodes of `flow_id`.
    #[must_use]
    pub fn then(flow_id: Id, source_id: Id, target_id: Id) -> Self {
        Self {
            id: Id::new_now(),
            flow_id,
            source_id,
            target_id,
            source_handler: EdgeHandle::Then,
            kind: EdgeKind::Unspecified,
        }
    }
}

// =============================================================================
// NODE PAYLOADS
// =============================================================================

coded_enum! {
    pub enum NoopKind {
        #[default]
        Unspecified = 0 => "unspecified",
        Start = 1 => "start",
    }
}

coded_enum! {
    pub enum ErrorHandling {
        #[default]
        Unspecified = 0 => "unspecified",
        Ignore = 1 => "ignore",
        Break = 2 => "break",
    }
}

coded_enum! {
    pub enum AiModel {
        #[default]
        Unspecified = 0 => "unspecified",
        Gpt4o = 1 => "gpt_4o",
        Gpt4oMini = 2 => "gpt_4o_mini",
        O3 = 3 => "o3",
        ClaudeOpus = 4 => "claude_opus",
        ClaudeSonnet = 5 => "claude_sonnet",
        ClaudeHaiku = 6 => "claude_haiku",
        GeminiPro = 7 => "gemini_pro",
        GeminiFlash = 8 => "gemini_flash",
        Custom = 9 => "custom",
    }
}

coded_enum! {
    pub enum MemoryType {
        #[default]
        Unspecified = 0 => "unspecified",
        WindowBuffer = 1 => "window_buffer",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoopNode {
    pub flow_node_id: Id,
    pub kind: NoopKind,
}

impl NoopNode {
    #[must_use]
    pub fn is_start(&self) -> bool {
        self.kind == NoopKind::Start
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestNode {
    pub flow_node_id: Id,
    pub endpoint_id: Option<Id>,
    pub example_id: Option<Id>,
    pub delta_endpoint_id: Option<Id>,
    pub delta_example_id: Option<Id>,
    pub has_request_config: bool,
}

impl RequestNode {
    /// True when the node executes (or overrides) one of `examples`.
    #[must_use]
    pub fn references_any(&self, examples: &std::collections::BTreeSet<Id>) -> bool {
        [self.example_id, self.delta_example_id]
            .into_iter()
            .flatten()
            .any(|id| examples.contains(&id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionNode {
    pub flow_node_id: Id,
    pub condition: Condition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForNode {
    pub flow_node_id: Id,
    pub iter_count: i64,
    pub condition: Condition,
    pub error_handling: ErrorHandling,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForEachNode {
    pub flow_node_id: Id,
    pub iter_expression: String,
    pub condition: Condition,
    pub error_handling: ErrorHandling,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsNode {
    pub flow_node_id: Id,
    #[serde(with = "super::base64_bytes")]
    pub code: Vec<u8>,
    pub compress_type: CompressType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiNode {
    pub flow_node_id: Id,
    pub prompt: String,
    pub max_iterations: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiProviderNode {
    pub flow_node_id: Id,
    pub credential_id: Option<Id>,
    pub model: AiModel,
    pub custom_model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiMemoryNode {
    pub flow_node_id: Id,
    pub memory_type: MemoryType,
    pub window_size: i32,
}

/// The per-kind payload of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodePayload {
    NoOp(NoopNode),
    Request(RequestNode),
    Condition(ConditionNode),
    For(ForNode),
    ForEach(ForEachNode),
    Js(JsNode),
    Ai(AiNode),
    AiProvider(AiProviderNode),
    AiMemory(AiMemoryNode),
}

impl NodePayload {
    /// The node kind this payload belongs to.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::NoOp(_) => NodeKind::NoOp,
            Self::Request(_) => NodeKind::Request,
            Self::Condition(_) => NodeKind::Condition,
            Self::For(_) => NodeKind::For,
            Self::ForEach(_) => NodeKind::ForEach,
            Self::Js(_) => NodeKind::Js,
            Self::Ai(_) => NodeKind::Ai,
            Self::AiProvider(_) => NodeKind::AiProvider,
            Self::AiMemory(_) => NodeKind::AiMemory,
        }
    }

    #[must_use]
    pub fn node_id(&self) -> Id {
        match self {
            Self::NoOp(p) => p.flow_node_id,
            Self::Request(p) => p.flow_node_id,
            Self::Condition(p) => p.flow_node_id,
            Self::For(p) => p.flow_node_id,
            Self::ForEach(p) => p.flow_node_id,
            Self::Js(p) => p.flow_node_id,
            Self::Ai(p) => p.flow_node_id,
            Self::AiProvider(p) => p.flow_node_id,
            Self::AiMemory(p) => p.flow_node_id,
        }
    }

    /// Rebind the payload to another node ID.
    pub fn set_node_id(&mut self, id: Id) {
        match self {
            Self::NoOp(p) => p.flow_node_id = id,
            Self::Request(p) => p.flow_node_id = id,
            Self::Condition(p) => p.flow_node_id = id,
            Self::For(p) => p.flow_node_id = id,
            Self::ForEach(p) => p.flow_node_id = id,
            Self::Js(p) => p.flow_node_id = id,
            Self::Ai(p) => p.flow_node_id = id,
            Self::AiProvider(p) => p.flow_node_id = id,
            Self::AiMemory(p) => p.flow_node_id = id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn payload_kind_matches_variant() {
        let id = Id::new_now();
        let payload = NodePayload::NoOp(NoopNode {
            flow_node_id: id,
            kind: NoopKind::Start,
        });
        assert_eq!(payload.kind(), NodeKind::NoOp);
        assert_eq!(payload.node_id(), id);
    }

    #[test]
    fn request_node_matches_example_or_delta_example() {
        let wanted = Id::new_now();
        let set = BTreeSet::from([wanted]);

        let direct = RequestNode {
            example_id: Some(wanted),
            ..RequestNode::default()
        };
        let delta = RequestNode {
            delta_example_id: Some(wanted),
            ..RequestNode::default()
        };
        assert!(direct.references_any(&set));
        assert!(delta.references_any(&set));
        assert!(!RequestNode::default().references_any(&set));
    }
}
