//! Table catalogue: one marker per stored entity kind.

use super::{ParentIndex, RowTable, Table};
use crate::id::Id;
use crate::model::{
    AiMemoryNode, AiNode, AiProviderNode, Collection, ConditionNode, Credential, CredentialKind,
    CredentialSecret, Edge, Endpoint, Environment, Example, ExampleAssert, ExampleBodyRaw,
    ExampleKeyValue, File, Flow, FlowVariable, Folder, ForEachNode, ForNode, Http, HttpAssert,
    HttpBodyRaw, HttpKeyValue, JsNode, Node, NoopNode, RequestNode, Response, ResponseAssert,
    ResponseHeader, Variable, Workspace, WorkspaceUser,
};
use redb::TableDefinition;

macro_rules! table {
    ($(#[$meta:meta])* $marker:ident: $model:ty, $name:literal, key = $id:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $marker;

        impl Table for $marker {
            type Model = $model;
            const NAME: &'static str = $name;
            const ROWS: RowTable = TableDefinition::new($name);

            fn id(model: &$model) -> Id {
                model.$id
            }
        }
    };
    ($(#[$meta:meta])* $marker:ident: $model:ty, $name:literal, key = $id:ident, parent = $parent:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $marker;

        impl Table for $marker {
            type Model = $model;
            const NAME: &'static str = $name;
            const ROWS: RowTable = TableDefinition::new($name);
            const BY_PARENT: Option<ParentIndex> =
                Some(TableDefinition::new(concat!($name, "_by_", stringify!($parent))));

            fn id(model: &$model) -> Id {
                model.$id
            }

            fn parent(model: &$model) -> Option<Id> {
                Some(model.$parent)
            }
        }
    };
}

table!(Workspaces: Workspace, "workspace", key = id);
table!(
    /// Indexed by user so "my workspaces" and membership checks are range scans.
    WorkspaceUsers: WorkspaceUser, "workspace_user", key = id, parent = user_id
);

table!(Collections: Collection, "collection", key = id, parent = workspace_id);
table!(Folders: Folder, "collection_folder", key = id, parent = collection_id);
table!(Endpoints: Endpoint, "collection_endpoint", key = id, parent = collection_id);
table!(Examples: Example, "example", key = id, parent = item_api_id);
table!(ExampleHeaders: ExampleKeyValue, "example_header", key = id, parent = example_id);
table!(ExampleQueries: ExampleKeyValue, "example_query", key = id, parent = example_id);
table!(ExampleBodyForms: ExampleKeyValue, "example_body_form", key = id, parent = example_id);
table!(ExampleBodyUrlEncoded: ExampleKeyValue, "example_body_urlencoded", key = id, parent = example_id);
table!(ExampleAsserts: ExampleAssert, "example_assert", key = id, parent = example_id);
table!(ExampleBodyRaws: ExampleBodyRaw, "example_body_raw", key = id, parent = example_id);
table!(Responses: Response, "example_response", key = id, parent = example_id);
table!(ResponseHeaders: ResponseHeader, "example_response_header", key = id, parent = response_id);
table!(ResponseAsserts: ResponseAssert, "example_response_assert", key = id, parent = response_id);

table!(Https: Http, "http", key = id, parent = workspace_id);
table!(HttpHeaders: HttpKeyValue, "http_header", key = id, parent = http_id);
table!(HttpSearchParams: HttpKeyValue, "http_search_param", key = id, parent = http_id);
table!(HttpBodyForms: HttpKeyValue, "http_body_form", key = id, parent = http_id);
table!(HttpBodyUrlEncoded: HttpKeyValue, "http_body_urlencoded", key = id, parent = http_id);
table!(HttpBodyRaws: HttpBodyRaw, "http_body_raw", key = id, parent = http_id);
table!(HttpAsserts: HttpAssert, "http_assert", key = id, parent = http_id);

table!(Files: File, "file", key = id, parent = workspace_id);

table!(Flows: Flow, "flow", key = id, parent = workspace_id);
table!(FlowVariables: FlowVariable, "flow_variable", key = id, parent = flow_id);
table!(Nodes: Node, "flow_node", key = id, parent = flow_id);
table!(Edges: Edge, "flow_edge", key = id, parent = flow_id);
table!(NoopNodes: NoopNode, "flow_node_noop", key = flow_node_id);
table!(RequestNodes: RequestNode, "flow_node_request", key = flow_node_id);
table!(ConditionNodes: ConditionNode, "flow_node_condition", key = flow_node_id);
table!(ForNodes: ForNode, "flow_node_for", key = flow_node_id);
table!(ForEachNodes: ForEachNode, "flow_node_for_each", key = flow_node_id);
table!(JsNodes: JsNode, "flow_node_js", key = flow_node_id);
table!(AiNodes: AiNode, "flow_node_ai", key = flow_node_id);
table!(AiProviderNodes: AiProviderNode, "flow_node_ai_provider", key = flow_node_id);
table!(AiMemoryNodes: AiMemoryNode, "flow_node_ai_memory", key = flow_node_id);

table!(Environments: Environment, "environment", key = id, parent = workspace_id);
table!(Variables: Variable, "variable", key = id, parent = env_id);

table!(Credentials: Credential, "credential", key = id, parent = workspace_id);
table!(OpenAiSecrets: CredentialSecret, "credential_openai", key = credential_id);
table!(GeminiSecrets: CredentialSecret, "credential_gemini", key = credential_id);
table!(AnthropicSecrets: CredentialSecret, "credential_anthropic", key = credential_id);

/// Row table of the secret side table for `kind`.
#[must_use]
pub fn secret_table(kind: CredentialKind) -> RowTable {
    match kind {
        CredentialKind::OpenAi => OpenAiSecrets::ROWS,
        CredentialKind::Gemini => GeminiSecrets::ROWS,
        CredentialKind::Anthropic => AnthropicSecrets::ROWS,
    }
}

macro_rules! catalogue {
    ($($marker:ident),+ $(,)?) => {
        /// Every row table, created when the store opens.
        pub const ALL_ROWS: &[RowTable] = &[$($marker::ROWS),+];

        const INDEX_SLOTS: &[Option<ParentIndex>] = &[$($marker::BY_PARENT),+];
    };
}

catalogue!(
    Workspaces,
    WorkspaceUsers,
    Collections,
    Folders,
    Endpoints,
    Examples,
    ExampleHeaders,
    ExampleQueries,
    ExampleBodyForms,
    ExampleBodyUrlEncoded,
    ExampleAsserts,
    ExampleBodyRaws,
    Responses,
    ResponseHeaders,
    ResponseAsserts,
    Https,
    HttpHeaders,
    HttpSearchParams,
    HttpBodyForms,
    HttpBodyUrlEncoded,
    HttpBodyRaws,
    HttpAsserts,
    Files,
    Flows,
    FlowVariables,
    Nodes,
    Edges,
    NoopNodes,
    RequestNodes,
    ConditionNodes,
    ForNodes,
    ForEachNodes,
    JsNodes,
    AiNodes,
    AiProviderNodes,
    AiMemoryNodes,
    Environments,
    Variables,
    Credentials,
    OpenAiSecrets,
    GeminiSecrets,
    AnthropicSecrets,
);

/// Every parent index, created when the store opens.
pub static ALL_INDEXES: std::sync::LazyLock<Vec<ParentIndex>> =
    std::sync::LazyLock::new(|| INDEX_SLOTS.iter().flatten().copied().collect());

#[cfg(test)]
mod tests {
    use super::*;
    use redb::TableHandle;
    use std::collections::BTreeSet;

    #[test]
    fn table_names_are_unique() {
        let names: BTreeSet<&str> = ALL_ROWS.iter().map(|t| t.name()).collect();
        assert_eq!(names.len(), ALL_ROWS.len());
    }

    #[test]
    fn secret_tables_follow_kind() {
        assert_eq!(secret_table(CredentialKind::Anthropic).name(), "credential_anthropic");
        assert_eq!(secret_table(CredentialKind::OpenAi).name(), "credential_openai");
    }

    #[test]
    fn parent_indexes_are_named_after_their_table() {
        let names: Vec<&str> = ALL_INDEXES.iter().map(|t| t.name()).collect();
        assert!(names.contains(&"variable_by_env_id"));
        assert!(names.contains(&"workspace_user_by_user_id"));
    }
}
