//! # Writer Layer
//!
//! Mutations under a caller-owned [`WriteTransaction`]. Nothing here commits:
//! the caller decides, so an importer or a batch mutation stays atomic.
//!
//! Cascades are explicit. Deleting a row removes everything that exists
//! only through it (see the `delete_*` functions), and deleting a member of
//! a linked list patches its neighbours so the list stays well formed.

use super::reader::{self, Linked, order_linked};
use super::tables::{
    AiMemoryNodes, AiNodes, AiProviderNodes, AnthropicSecrets, Collections, ConditionNodes,
    Credentials, Edges, Endpoints, Environments, ExampleAsserts, ExampleBodyForms,
    ExampleBodyRaws, ExampleBodyUrlEncoded, ExampleHeaders, ExampleQueries, Examples, Files,
    FlowVariables, Flows, Folders, ForEachNodes, ForNodes, GeminiSecrets, HttpAsserts,
    HttpBodyForms, HttpBodyRaws, HttpBodyUrlEncoded, HttpHeaders, HttpSearchParams, Https,
    JsNodes, Nodes, NoopNodes, OpenAiSecrets, RequestNodes, ResponseAsserts, ResponseHeaders,
    Responses, Variables, WorkspaceUsers, Workspaces, secret_table,
};
use super::{StoreError, Table};
use crate::error::{EngineError, EngineResult};
use crate::id::Id;
use crate::mapper::Mapped;
use crate::model::{Credential, CredentialSecret, Environment, Variable};
use redb::WriteTransaction;
use serde::{Deserialize, Serialize};

// =============================================================================
// GENERIC MUTATIONS
// =============================================================================

fn put<T: Table>(tx: &WriteTransaction, model: &T::Model, previous: Option<&T::Model>) -> Result<(), StoreError> {
    let bytes = T::encode(model)?;
    let key = T::id(model).to_key();
    {
        let mut rows = tx.open_table(T::ROWS)?;
        rows.insert(key, bytes.as_slice())?;
    }
    if let Some(index) = T::BY_PARENT {
        let mut parents = tx.open_table(index)?;
        let old_parent = previous.and_then(T::parent);
        let new_parent = T::parent(model);
        if let Some(old) = old_parent
            && old_parent != new_parent
        {
            parents.remove((old.to_key(), key))?;
        }
        if let Some(parent) = new_parent {
            parents.insert((parent.to_key(), key), ())?;
        }
    }
    Ok(())
}

/// Insert a new row. `Conflict` when the ID is taken.
pub fn insert<T: Table>(tx: &WriteTransaction, model: &T::Model) -> Result<(), StoreError> {
    let id = T::id(model);
    if reader::exists::<T>(tx, id)? {
        return Err(StoreError::Conflict { table: T::NAME, id });
    }
    put::<T>(tx, model, None)
}

/// Replace an existing row. `NotFound` when it does not exist.
pub fn update<T: Table>(tx: &WriteTransaction, model: &T::Model) -> Result<(), StoreError> {
    let previous = reader::get::<T>(tx, T::id(model))?;
    put::<T>(tx, model, Some(&previous))
}

/// Insert or replace. Returns whether a row already existed.
pub fn upsert<T: Table>(tx: &WriteTransaction, model: &T::Model) -> Result<bool, StoreError> {
    let previous = reader::find::<T>(tx, T::id(model))?;
    put::<T>(tx, model, previous.as_ref())?;
    Ok(previous.is_some())
}

/// Delete one row without cascading. Returns whether it existed.
pub fn delete<T: Table>(tx: &WriteTransaction, id: Id) -> Result<bool, StoreError> {
    let Some(previous) = reader::find::<T>(tx, id)? else {
        return Ok(false);
    };
    let key = id.to_key();
    {
        let mut rows = tx.open_table(T::ROWS)?;
        rows.remove(key)?;
    }
    if let (Some(index), Some(parent)) = (T::BY_PARENT, T::parent(&previous)) {
        let mut parents = tx.open_table(index)?;
        parents.remove((parent.to_key(), key))?;
    }
    Ok(true)
}

fn delete_children<T: Table>(tx: &WriteTransaction, parent: Id) -> Result<usize, StoreError> {
    let children = reader::list_by::<T>(tx, parent)?;
    for child in &children {
        delete::<T>(tx, T::id(child))?;
    }
    Ok(children.len())
}

// =============================================================================
// LINKED LISTS
// =============================================================================

/// Where to place a moved row relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovePosition {
    #[default]
    Unspecified,
    Before,
    After,
}

/// Rewrite links and display order of `ordered` to match its sequence,
/// writing only rows that changed.
fn relink<T>(tx: &WriteTransaction, mut ordered: Vec<T::Model>) -> Result<Vec<T::Model>, StoreError>
where
    T: Table,
    T::Model: Linked + Clone + PartialEq,
{
    let ids: Vec<Id> = ordered.iter().map(Linked::id).collect();
    for (i, item) in ordered.iter_mut().enumerate() {
        let before = item.clone();
        let prev = i.checked_sub(1).map(|p| ids[p]);
        let next = ids.get(i + 1).copied();
        item.set_links(prev, next);
        item.set_display_order(i as f64);
        if *item != before {
            upsert::<T>(tx, item)?;
        }
    }
    Ok(ordered)
}

fn unlink<T>(tx: &WriteTransaction, removed: Id, siblings: Vec<T::Model>) -> Result<(), StoreError>
where
    T: Table,
    T::Model: Linked + Clone + PartialEq,
{
    let remaining: Vec<T::Model> = order_linked(siblings)
        .into_iter()
        .filter(|s| s.id() != removed)
        .collect();
    relink::<T>(tx, remaining)?;
    Ok(())
}

fn move_within<T>(
    tx: &WriteTransaction,
    siblings: Vec<T::Model>,
    id: Id,
    target: Id,
    position: MovePosition,
) -> EngineResult<Vec<T::Model>>
where
    T: Table,
    T::Model: Linked + Clone + PartialEq,
{
    let mut ordered = order_linked(siblings);
    let from = ordered
        .iter()
        .position(|s| s.id() == id)
        .ok_or(EngineError::NotFound { kind: T::NAME, id })?;
    let moved = ordered.remove(from);
    let at = ordered
        .iter()
        .position(|s| s.id() == target)
        .ok_or_else(|| EngineError::validation("target_id", "target is not in the same list"))?;
    let insert_at = if position == MovePosition::After { at + 1 } else { at };
    ordered.insert(insert_at, moved);
    Ok(relink::<T>(tx, ordered)?)
}

fn check_move(id: Id, target: Id, position: MovePosition) -> EngineResult<()> {
    if position == MovePosition::Unspecified {
        return Err(EngineError::validation("position", "move position must be before or after"));
    }
    if id == target {
        return Err(EngineError::validation("target_id", "cannot move relative to itself"));
    }
    Ok(())
}

/// Insert `env` at the tail of its workspace's environment list.
pub fn append_environment(tx: &WriteTransaction, env: &Environment) -> Result<Environment, StoreError> {
    let mut ordered = reader::environments_ordered(tx, env.workspace_id)?;
    insert::<Environments>(tx, env)?;
    ordered.push(env.clone());
    let ordered = relink::<Environments>(tx, ordered)?;
    Ok(ordered.into_iter().last().unwrap_or_else(|| env.clone()))
}

/// Insert `var` at the tail of its environment's variable list.
pub fn append_variable(tx: &WriteTransaction, var: &Variable) -> Result<Variable, StoreError> {
    let mut ordered = reader::variables_ordered(tx, var.env_id)?;
    insert::<Variables>(tx, var)?;
    ordered.push(var.clone());
    let ordered = relink::<Variables>(tx, ordered)?;
    Ok(ordered.into_iter().last().unwrap_or_else(|| var.clone()))
}

/// Move environment `id` before or after `target_id` in its workspace list.
pub fn move_environment(
    tx: &WriteTransaction,
    id: Id,
    target_id: Id,
    position: MovePosition,
) -> EngineResult<Vec<Environment>> {
    check_move(id, target_id, position)?;
    let env = reader::get::<Environments>(tx, id)?;
    let target = reader::get::<Environments>(tx, target_id)?;
    if env.workspace_id != target.workspace_id {
        return Err(EngineError::validation("target_id", "target is in another workspace"));
    }
    let siblings = reader::list_by::<Environments>(tx, env.workspace_id)?;
    move_within::<Environments>(tx, siblings, id, target_id, position)
}

/// Move variable `id` before or after `target_id` in its environment list.
pub fn move_variable(
    tx: &WriteTransaction,
    id: Id,
    target_id: Id,
    position: MovePosition,
) -> EngineResult<Vec<Variable>> {
    check_move(id, target_id, position)?;
    let var = reader::get::<Variables>(tx, id)?;
    let target = reader::get::<Variables>(tx, target_id)?;
    if var.env_id != target.env_id {
        let env = reader::get::<Environments>(tx, var.env_id)?;
        let target_env = reader::get::<Environments>(tx, target.env_id)?;
        if env.workspace_id != target_env.workspace_id {
            return Err(EngineError::validation("target_id", "target is in another workspace"));
        }
        return Err(EngineError::validation("target_id", "target is in another environment"));
    }
    let siblings = reader::list_by::<Variables>(tx, var.env_id)?;
    move_within::<Variables>(tx, siblings, id, target_id, position)
}

// =============================================================================
// CASCADING DELETES
// =============================================================================

/// Store the secret side row of `credential` in its kind's table.
pub fn put_secret(tx: &WriteTransaction, credential: &Credential, secret: &CredentialSecret) -> Result<(), StoreError> {
    let bytes = postcard::to_allocvec(&secret.to_row()).map_err(|e| StoreError::Codec(e.to_string()))?;
    let mut table = tx.open_table(secret_table(credential.kind))?;
    table.insert(credential.id.to_key(), bytes.as_slice())?;
    Ok(())
}

/// Remove a credential and its side row. Returns whether it existed.
pub fn delete_credential(tx: &WriteTransaction, id: Id) -> Result<bool, StoreError> {
    delete::<OpenAiSecrets>(tx, id)?;
    delete::<GeminiSecrets>(tx, id)?;
    delete::<AnthropicSecrets>(tx, id)?;
    delete::<Credentials>(tx, id)
}

pub fn delete_response(tx: &WriteTransaction, id: Id) -> Result<bool, StoreError> {
    delete_children::<ResponseHeaders>(tx, id)?;
    delete_children::<ResponseAsserts>(tx, id)?;
    delete::<Responses>(tx, id)
}

/// Remove an example, its request parts and responses.
pub fn delete_example(tx: &WriteTransaction, id: Id) -> Result<bool, StoreError> {
    let Some(example) = reader::find::<Examples>(tx, id)? else {
        return Ok(false);
    };
    delete_children::<ExampleHeaders>(tx, id)?;
    delete_children::<ExampleQueries>(tx, id)?;
    delete_children::<ExampleBodyForms>(tx, id)?;
    delete_children::<ExampleBodyUrlEncoded>(tx, id)?;
    delete_children::<ExampleAsserts>(tx, id)?;
    delete_children::<ExampleBodyRaws>(tx, id)?;
    for response in reader::list_by::<Responses>(tx, id)? {
        delete_response(tx, response.id)?;
    }
    let siblings = reader::list_by::<Examples>(tx, example.item_api_id)?;
    delete::<Examples>(tx, id)?;
    unlink::<Examples>(tx, id, siblings)?;
    Ok(true)
}

pub fn delete_endpoint(tx: &WriteTransaction, id: Id) -> Result<bool, StoreError> {
    for example in reader::list_by::<Examples>(tx, id)? {
        delete_example(tx, example.id)?;
    }
    delete::<Endpoints>(tx, id)
}

/// Remove a folder, its sub-folders and the endpoints under them.
pub fn delete_folder(tx: &WriteTransaction, id: Id) -> Result<bool, StoreError> {
    let Some(folder) = reader::find::<Folders>(tx, id)? else {
        return Ok(false);
    };
    let siblings = reader::list_by::<Folders>(tx, folder.collection_id)?;
    for child in siblings.iter().filter(|f| f.parent_id == Some(id)) {
        delete_folder(tx, child.id)?;
    }
    for endpoint in reader::list_by::<Endpoints>(tx, folder.collection_id)? {
        if endpoint.folder_id == Some(id) {
            delete_endpoint(tx, endpoint.id)?;
        }
    }
    delete::<Folders>(tx, id)
}

pub fn delete_collection(tx: &WriteTransaction, id: Id) -> Result<bool, StoreError> {
    for endpoint in reader::list_by::<Endpoints>(tx, id)? {
        delete_endpoint(tx, endpoint.id)?;
    }
    delete_children::<Folders>(tx, id)?;
    delete::<Collections>(tx, id)
}

/// Remove a node, its payload and every edge touching it.
pub fn delete_node(tx: &WriteTransaction, id: Id) -> Result<bool, StoreError> {
    let Some(node) = reader::find::<Nodes>(tx, id)? else {
        return Ok(false);
    };
    delete::<NoopNodes>(tx, id)?;
    delete::<RequestNodes>(tx, id)?;
    delete::<ConditionNodes>(tx, id)?;
    delete::<ForNodes>(tx, id)?;
    delete::<ForEachNodes>(tx, id)?;
    delete::<JsNodes>(tx, id)?;
    delete::<AiNodes>(tx, id)?;
    delete::<AiProviderNodes>(tx, id)?;
    delete::<AiMemoryNodes>(tx, id)?;
    for edge in reader::list_by::<Edges>(tx, node.flow_id)? {
        if edge.source_id == id || edge.target_id == id {
            delete::<Edges>(tx, edge.id)?;
        }
    }
    delete::<Nodes>(tx, id)
}

pub fn delete_flow(tx: &WriteTransaction, id: Id) -> Result<bool, StoreError> {
    delete_children::<FlowVariables>(tx, id)?;
    for node in reader::list_by::<Nodes>(tx, id)? {
        delete_node(tx, node.id)?;
    }
    delete_children::<Edges>(tx, id)?;
    delete::<Flows>(tx, id)
}

/// Remove an HTTP request, its sub-rows and any delta requests over it.
pub fn delete_http(tx: &WriteTransaction, id: Id) -> Result<bool, StoreError> {
    let Some(http) = reader::find::<Https>(tx, id)? else {
        return Ok(false);
    };
    if !http.is_delta {
        for delta in reader::list_by::<Https>(tx, http.workspace_id)? {
            if delta.parent_http_id == Some(id) {
                delete_http(tx, delta.id)?;
            }
        }
    }
    delete_children::<HttpHeaders>(tx, id)?;
    delete_children::<HttpSearchParams>(tx, id)?;
    delete_children::<HttpBodyForms>(tx, id)?;
    delete_children::<HttpBodyUrlEncoded>(tx, id)?;
    delete_children::<HttpBodyRaws>(tx, id)?;
    delete_children::<HttpAsserts>(tx, id)?;
    delete::<Https>(tx, id)
}

/// Remove a file entry and every entry below it.
pub fn delete_file(tx: &WriteTransaction, id: Id) -> Result<bool, StoreError> {
    let Some(file) = reader::find::<Files>(tx, id)? else {
        return Ok(false);
    };
    for child in reader::list_by::<Files>(tx, file.workspace_id)? {
        if child.parent_id == Some(id) {
            delete_file(tx, child.id)?;
        }
    }
    delete::<Files>(tx, id)
}

/// Remove a variable and close the gap it leaves in its list.
pub fn delete_variable(tx: &WriteTransaction, id: Id) -> Result<bool, StoreError> {
    let Some(var) = reader::find::<Variables>(tx, id)? else {
        return Ok(false);
    };
    let siblings = reader::list_by::<Variables>(tx, var.env_id)?;
    delete::<Variables>(tx, id)?;
    unlink::<Variables>(tx, id, siblings)?;
    Ok(true)
}

/// Remove an environment with its variables and close the gap in its list.
pub fn delete_environment(tx: &WriteTransaction, id: Id) -> Result<bool, StoreError> {
    let Some(env) = reader::find::<Environments>(tx, id)? else {
        return Ok(false);
    };
    delete_children::<Variables>(tx, id)?;
    let siblings = reader::list_by::<Environments>(tx, env.workspace_id)?;
    delete::<Environments>(tx, id)?;
    unlink::<Environments>(tx, id, siblings)?;

    if let Some(mut ws) = reader::find::<Workspaces>(tx, env.workspace_id)? {
        let before = (ws.active_env, ws.global_env);
        ws.active_env = ws.active_env.filter(|e| *e != id);
        ws.global_env = ws.global_env.filter(|e| *e != id);
        if before != (ws.active_env, ws.global_env) {
            update::<Workspaces>(tx, &ws)?;
        }
    }
    Ok(true)
}

/// Remove a workspace and everything it owns.
pub fn delete_workspace(tx: &WriteTransaction, id: Id) -> Result<bool, StoreError> {
    if !reader::exists::<Workspaces>(tx, id)? {
        return Ok(false);
    }
    for collection in reader::list_by::<Collections>(tx, id)? {
        delete_collection(tx, collection.id)?;
    }
    for http in reader::list_by::<Https>(tx, id)? {
        // deltas may already be gone with their base
        delete_http(tx, http.id)?;
    }
    delete_children::<Files>(tx, id)?;
    for flow in reader::list_by::<Flows>(tx, id)? {
        delete_flow(tx, flow.id)?;
    }
    for env in reader::list_by::<Environments>(tx, id)? {
        delete_children::<Variables>(tx, env.id)?;
        delete::<Environments>(tx, env.id)?;
    }
    for credential in reader::list_by::<Credentials>(tx, id)? {
        delete_credential(tx, credential.id)?;
    }
    for member in reader::members_of(tx, id)? {
        delete::<WorkspaceUsers>(tx, member.id)?;
    }
    delete::<Workspaces>(tx, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CredentialKind, Edge, Flow, Node, NodeKind, NoopKind, NoopNode, Workspace};
    use crate::storage::Store;
    use crate::vault::Vault;

    fn workspace(store: &Store) -> Workspace {
        let ws = Workspace::new("w");
        store
            .write_with(|tx| insert::<Workspaces>(tx, &ws))
            .expect("workspace");
        ws
    }

    #[test]
    fn insert_conflicts_on_existing_id() {
        let store = Store::in_memory().expect("store");
        let ws = workspace(&store);
        let err = store
            .write_with(|tx| insert::<Workspaces>(tx, &ws))
            .expect_err("conflict");
        assert!(matches!(err, StoreError::Conflict { table: "workspace", .. }));
    }

    #[test]
    fn update_missing_row_is_not_found() {
        let store = Store::in_memory().expect("store");
        let ws = Workspace::new("ghost");
        let err = store
            .write_with(|tx| update::<Workspaces>(tx, &ws))
            .expect_err("missing");
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn delete_is_idempotent() {
        let store = Store::in_memory().expect("store");
        let ws = workspace(&store);
        let cred = Credential::new(ws.id, "key", CredentialKind::OpenAi);
        store
            .write_with(|tx| insert::<Credentials>(tx, &cred))
            .expect("insert");

        assert!(store.write_with(|tx| delete_credential(tx, cred.id)).expect("first"));
        assert!(!store.write_with(|tx| delete_credential(tx, cred.id)).expect("second"));
    }

    #[test]
    fn update_moves_parent_index() {
        let store = Store::in_memory().expect("store");
        let a = workspace(&store);
        let b = workspace(&store);
        let mut flow = Flow::new(a.id, "f");
        store.write_with(|tx| insert::<Flows>(tx, &flow)).expect("insert");

        flow.workspace_id = b.id;
        store.write_with(|tx| update::<Flows>(tx, &flow)).expect("update");

        let read = store.read().expect("read");
        assert!(reader::list_by::<Flows>(&read, a.id).expect("list").is_empty());
        assert_eq!(reader::list_by::<Flows>(&read, b.id).expect("list").len(), 1);
    }

    #[test]
    fn credential_secret_lives_in_kind_table() {
        let store = Store::in_memory().expect("store");
        let ws = workspace(&store);
        let cred = Credential::new(ws.id, "claude", CredentialKind::Anthropic);
        let secret = CredentialSecret::seal(&Vault::default(), cred.id, b"sk-ant", None).expect("seal");
        store
            .write_with(|tx| {
                insert::<Credentials>(tx, &cred)?;
                put_secret(tx, &cred, &secret)
            })
            .expect("insert");

        let read = store.read().expect("read");
        let stored = reader::secret_for(&read, &cred).expect("read").expect("present");
        assert_eq!(stored.open(&Vault::default()).expect("open"), b"sk-ant");
        assert!(reader::find::<OpenAiSecrets>(&read, cred.id).expect("find").is_none());
    }

    #[test]
    fn deleting_node_drops_payload_and_edges() {
        let store = Store::in_memory().expect("store");
        let ws = workspace(&store);
        let flow = Flow::new(ws.id, "f");
        let start = Node::new(flow.id, "Start", NodeKind::NoOp);
        let other = Node::new(flow.id, "Other", NodeKind::NoOp);
        let edge = Edge::then(flow.id, start.id, other.id);
        store
            .write_with(|tx| {
                insert::<Flows>(tx, &flow)?;
                insert::<Nodes>(tx, &start)?;
                insert::<Nodes>(tx, &other)?;
                insert::<NoopNodes>(tx, &NoopNode { flow_node_id: start.id, kind: NoopKind::Start })?;
                insert::<Edges>(tx, &edge)
            })
            .expect("seed");

        store.write_with(|tx| delete_node(tx, start.id)).expect("delete");

        let read = store.read().expect("read");
        assert!(reader::find::<NoopNodes>(&read, start.id).expect("find").is_none());
        assert!(reader::list_by::<Edges>(&read, flow.id).expect("list").is_empty());
        assert_eq!(reader::list_by::<Nodes>(&read, flow.id).expect("list").len(), 1);
    }

    fn seeded_envs(store: &Store, ws: &Workspace, n: usize) -> Vec<Id> {
        store
            .write_with(|tx| {
                let mut ids = Vec::new();
                for i in 0..n {
                    let env = Environment::new(ws.id, format!("env-{i}"));
                    append_environment(tx, &env)?;
                    ids.push(env.id);
                }
                Ok::<_, StoreError>(ids)
            })
            .expect("seed")
    }

    fn env_order(store: &Store, ws: &Workspace) -> Vec<Id> {
        let read = store.read().expect("read");
        reader::environments_ordered(&read, ws.id)
            .expect("list")
            .iter()
            .map(|e| e.id)
            .collect()
    }

    #[test]
    fn append_links_in_insertion_order() {
        let store = Store::in_memory().expect("store");
        let ws = workspace(&store);
        let ids = seeded_envs(&store, &ws, 3);
        assert_eq!(env_order(&store, &ws), ids);

        let read = store.read().expect("read");
        let envs = reader::environments_ordered(&read, ws.id).expect("list");
        assert_eq!(envs[0].prev, None);
        assert_eq!(envs[2].next, None);
        assert_eq!(envs[1].prev, Some(ids[0]));
        assert_eq!(envs[1].next, Some(ids[2]));
    }

    #[test]
    fn move_before_and_after() {
        let store = Store::in_memory().expect("store");
        let ws = workspace(&store);
        let ids = seeded_envs(&store, &ws, 3);

        store
            .write_with(|tx| move_environment(tx, ids[2], ids[0], MovePosition::Before))
            .expect("move");
        assert_eq!(env_order(&store, &ws), vec![ids[2], ids[0], ids[1]]);

        store
            .write_with(|tx| move_environment(tx, ids[2], ids[1], MovePosition::After))
            .expect("move");
        assert_eq!(env_order(&store, &ws), vec![ids[0], ids[1], ids[2]]);
    }

    #[test]
    fn invalid_moves_are_rejected() {
        let store = Store::in_memory().expect("store");
        let ws = workspace(&store);
        let other = workspace(&store);
        let ids = seeded_envs(&store, &ws, 2);
        let foreign = seeded_envs(&store, &other, 1);

        let self_move = store.write_with(|tx| move_environment(tx, ids[0], ids[0], MovePosition::After));
        assert!(matches!(self_move, Err(EngineError::Validation { .. })));

        let unspecified = store.write_with(|tx| move_environment(tx, ids[0], ids[1], MovePosition::Unspecified));
        assert!(matches!(unspecified, Err(EngineError::Validation { field: "position", .. })));

        let cross = store.write_with(|tx| move_environment(tx, ids[0], foreign[0], MovePosition::Before));
        assert!(matches!(cross, Err(EngineError::Validation { .. })));
    }

    #[test]
    fn delete_environment_patches_neighbours() {
        let store = Store::in_memory().expect("store");
        let ws = workspace(&store);
        let ids = seeded_envs(&store, &ws, 3);

        store.write_with(|tx| delete_environment(tx, ids[1])).expect("delete");

        let read = store.read().expect("read");
        let envs = reader::environments_ordered(&read, ws.id).expect("list");
        assert_eq!(envs.len(), 2);
        assert_eq!(envs[0].next, Some(ids[2]));
        assert_eq!(envs[1].prev, Some(ids[0]));
    }

    #[test]
    fn delete_workspace_cascades() {
        let store = Store::in_memory().expect("store");
        let ws = workspace(&store);
        seeded_envs(&store, &ws, 2);
        let flow = Flow::new(ws.id, "f");
        store.write_with(|tx| insert::<Flows>(tx, &flow)).expect("flow");

        assert!(store.write_with(|tx| delete_workspace(tx, ws.id)).expect("delete"));

        let read = store.read().expect("read");
        assert!(reader::list_by::<Environments>(&read, ws.id).expect("envs").is_empty());
        assert!(reader::list_by::<Flows>(&read, ws.id).expect("flows").is_empty());
        assert!(reader::find::<Workspaces>(&read, ws.id).expect("ws").is_none());
    }
}
