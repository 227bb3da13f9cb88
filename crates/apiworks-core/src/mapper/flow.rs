use super::{Mapped, MapperError, id, key, opt_id, opt_key};
use crate::model::{
    AiMemoryNode, AiModel, AiNode, AiProviderNode, CompressType, Condition, ConditionNode, Edge,
    EdgeHandle, EdgeKind, ErrorHandling, Flow, FlowVariable, ForEachNode, ForNode, JsNode,
    MemoryType, Node, NodeKind, NoopKind, NoopNode, RequestNode,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowRow {
    pub id: u128,
    pub workspace_id: u128,
    pub name: String,
    pub version_parent_id: Option<u128>,
    pub duration: i32,
}

impl Mapped for Flow {
    type Row = FlowRow;

    fn to_row(&self) -> FlowRow {
        FlowRow {
            id: key(self.id),
            workspace_id: key(self.workspace_id),
            name: self.name.clone(),
            version_parent_id: opt_key(self.version_parent_id),
            duration: self.duration,
        }
    }

    fn from_row(row: FlowRow) -> Result<Self, MapperError> {
        Ok(Self {
            id: id(row.id),
            workspace_id: id(row.workspace_id),
            name: row.name,
            version_parent_id: opt_id(row.version_parent_id),
            duration: row.duration,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowVariableRow {
    pub id: u128,
    pub flow_id: u128,
    pub name: String,
    pub value: String,
    pub enabled: bool,
    pub description: String,
    pub display_order: f64,
}

impl Mapped for FlowVariable {
    type Row = FlowVariableRow;

    fn to_row(&self) -> FlowVariableRow {
        FlowVariableRow {
            id: key(self.id),
            flow_id: key(self.flow_id),
            name: self.name.clone(),
            value: self.value.clone(),
            enabled: self.enabled,
            description: self.description.clone(),
            display_order: self.display_order,
        }
    }

    fn from_row(row: FlowVariableRow) -> Result<Self, MapperError> {
        Ok(Self {
            id: id(row.id),
            flow_id: id(row.flow_id),
            name: row.name,
            value: row.value,
            enabled: row.enabled,
            description: row.description,
            display_order: row.display_order,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRow {
    pub id: u128,
    pub flow_id: u128,
    pub name: String,
    pub kind: i32,
    pub position_x: f64,
    pub position_y: f64,
}

impl Mapped for Node {
    type Row = NodeRow;

    fn to_row(&self) -> NodeRow {
        NodeRow {
            id: key(self.id),
            flow_id: key(self.flow_id),
            name: self.name.clone(),
            kind: self.kind.code(),
            position_x: self.position_x,
            position_y: self.position_y,
        }
    }

    fn from_row(row: NodeRow) -> Result<Self, MapperError> {
        Ok(Self {
            id: id(row.id),
            flow_id: id(row.flow_id),
            name: row.name,
            kind: NodeKind::try_from(row.kind)?,
            position_x: row.position_x,
            position_y: row.position_y,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRow {
    pub id: u128,
    pub flow_id: u128,
    pub source_id: u128,
    pub target_id: u128,
    pub source_handler: i32,
    pub kind: i32,
}

impl Mapped for Edge {
    type Row = EdgeRow;

    fn to_row(&self) -> EdgeRow {
        EdgeRow {
            id: key(self.id),
            flow_id: key(self.flow_id),
            source_id: key(self.source_id),
            target_id: key(self.target_id),
            source_handler: self.source_handler.code(),
            kind: self.kind.code(),
        }
    }

    fn from_row(row: EdgeRow) -> Result<Self, MapperError> {
        Ok(Self {
            id: id(row.id),
            flow_id: id(row.flow_id),
            source_id: id(row.source_id),
            target_id: id(row.target_id),
            source_handler: EdgeHandle::try_from(row.source_handler)?,
            kind: EdgeKind::try_from(row.kind)?,
        })
    }
}

// =============================================================================
// NODE PAYLOADS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoopNodeRow {
    pub flow_node_id: u128,
    pub node_type: i32,
}

impl Mapped for NoopNode {
    type Row = NoopNodeRow;

    fn to_row(&self) -> NoopNodeRow {
        NoopNodeRow {
            flow_node_id: key(self.flow_node_id),
            node_type: self.kind.code(),
        }
    }

    fn from_row(row: NoopNodeRow) -> Result<Self, MapperError> {
        Ok(Self {
            flow_node_id: id(row.flow_node_id),
            kind: NoopKind::try_from(row.node_type)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestNodeRow {
    pub flow_node_id: u128,
    pub endpoint_id: Option<u128>,
    pub example_id: Option<u128>,
    pub delta_endpoint_id: Option<u128>,
    pub delta_example_id: Option<u128>,
    pub has_request_config: bool,
}

impl Mapped for RequestNode {
    type Row = RequestNodeRow;

    fn to_row(&self) -> RequestNodeRow {
        RequestNodeRow {
            flow_node_id: key(self.flow_node_id),
            endpoint_id: opt_key(self.endpoint_id),
            example_id: opt_key(self.example_id),
            delta_endpoint_id: opt_key(self.delta_endpoint_id),
            delta_example_id: opt_key(self.delta_example_id),
            has_request_config: self.has_request_config,
        }
    }

    fn from_row(row: RequestNodeRow) -> Result<Self, MapperError> {
        Ok(Self {
            flow_node_id: id(row.flow_node_id),
            endpoint_id: opt_id(row.endpoint_id),
            example_id: opt_id(row.example_id),
            delta_endpoint_id: opt_id(row.delta_endpoint_id),
            delta_example_id: opt_id(row.delta_example_id),
            has_request_config: row.has_request_config,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionNodeRow {
    pub flow_node_id: u128,
    pub expression: String,
}

impl Mapped for ConditionNode {
    type Row = ConditionNodeRow;

    fn to_row(&self) -> ConditionNodeRow {
        ConditionNodeRow {
            flow_node_id: key(self.flow_node_id),
            expression: self.condition.expression.clone(),
        }
    }

    fn from_row(row: ConditionNodeRow) -> Result<Self, MapperError> {
        Ok(Self {
            flow_node_id: id(row.flow_node_id),
            condition: Condition {
                expression: row.expression,
            },
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForNodeRow {
    pub flow_node_id: u128,
    pub iter_count: i64,
    pub expression: String,
    pub error_handling: i32,
}

impl Mapped for ForNode {
    type Row = ForNodeRow;

    fn to_row(&self) -> ForNodeRow {
        ForNodeRow {
            flow_node_id: key(self.flow_node_id),
            iter_count: self.iter_count,
            expression: self.condition.expression.clone(),
            error_handling: self.error_handling.code(),
        }
    }

    fn from_row(row: ForNodeRow) -> Result<Self, MapperError> {
        Ok(Self {
            flow_node_id: id(row.flow_node_id),
            iter_count: row.iter_count,
            condition: Condition {
                expression: row.expression,
            },
            error_handling: ErrorHandling::try_from(row.error_handling)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForEachNodeRow {
    pub flow_node_id: u128,
    pub iter_expression: String,
    pub expression: String,
    pub error_handling: i32,
}

impl Mapped for ForEachNode {
    type Row = ForEachNodeRow;

    fn to_row(&self) -> ForEachNodeRow {
        ForEachNodeRow {
            flow_node_id: key(self.flow_node_id),
            iter_expression: self.iter_expression.clone(),
            expression: self.condition.expression.clone(),
            error_handling: self.error_handling.code(),
        }
    }

    fn from_row(row: ForEachNodeRow) -> Result<Self, MapperError> {
        Ok(Self {
            flow_node_id: id(row.flow_node_id),
            iter_expression: row.iter_expression,
            condition: Condition {
                expression: row.expression,
            },
            error_handling: ErrorHandling::try_from(row.error_handling)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsNodeRow {
    pub flow_node_id: u128,
    pub code: Vec<u8>,
    pub compress_type: i32,
}

impl Mapped for JsNode {
    type Row = JsNodeRow;

    fn to_row(&self) -> JsNodeRow {
        JsNodeRow {
            flow_node_id: key(self.flow_node_id),
            code: self.code.clone(),
            compress_type: self.compress_type.code(),
        }
    }

    fn from_row(row: JsNodeRow) -> Result<Self, MapperError> {
        Ok(Self {
            flow_node_id: id(row.flow_node_id),
            code: row.code,
            compress_type: CompressType::try_from(row.compress_type)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiNodeRow {
    pub flow_node_id: u128,
    pub prompt: String,
    pub max_iterations: i32,
}

impl Mapped for AiNode {
    type Row = AiNodeRow;

    fn to_row(&self) -> AiNodeRow {
        AiNodeRow {
            flow_node_id: key(self.flow_node_id),
            prompt: self.prompt.clone(),
            max_iterations: self.max_iterations,
        }
    }

    fn from_row(row: AiNodeRow) -> Result<Self, MapperError> {
        Ok(Self {
            flow_node_id: id(row.flow_node_id),
            prompt: row.prompt,
            max_iterations: row.max_iterations,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiProviderNodeRow {
    pub flow_node_id: u128,
    pub credential_id: Option<u128>,
    pub model: i32,
    pub custom_model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

impl Mapped for AiProviderNode {
    type Row = AiProviderNodeRow;

    fn to_row(&self) -> AiProviderNodeRow {
        AiProviderNodeRow {
            flow_node_id: key(self.flow_node_id),
            credential_id: opt_key(self.credential_id),
            model: self.model.code(),
            custom_model: self.custom_model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    fn from_row(row: AiProviderNodeRow) -> Result<Self, MapperError> {
        Ok(Self {
            flow_node_id: id(row.flow_node_id),
            credential_id: opt_id(row.credential_id),
            model: AiModel::try_from(row.model)?,
            custom_model: row.custom_model,
            temperature: row.temperature,
            max_tokens: row.max_tokens,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiMemoryNodeRow {
    pub flow_node_id: u128,
    pub memory_type: i32,
    pub window_size: i32,
}

impl Mapped for AiMemoryNode {
    type Row = AiMemoryNodeRow;

    fn to_row(&self) -> AiMemoryNodeRow {
        AiMemoryNodeRow {
            flow_node_id: key(self.flow_node_id),
            memory_type: self.memory_type.code(),
            window_size: self.window_size,
        }
    }

    fn from_row(row: AiMemoryNodeRow) -> Result<Self, MapperError> {
        Ok(Self {
            flow_node_id: id(row.flow_node_id),
            memory_type: MemoryType::try_from(row.memory_type)?,
            window_size: row.window_size,
        })
    }
}
