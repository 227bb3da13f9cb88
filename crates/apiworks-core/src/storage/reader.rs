//! # Reader Layer
//!
//! Read-only queries over any [`ReadScope`]. Listing never fails on an empty
//! result; fetching a single missing row through [`get`] is `NotFound`.
//!
//! Linked-list kinds (environments, variables, examples, folders) are
//! resolved into list order by [`order_linked`], which is deterministic for
//! a given set of rows so repeated listings agree.

use super::tables::{
    Collections, Credentials, Edges, Endpoints, Environments, ExampleAsserts, ExampleBodyForms,
    ExampleBodyRaws, ExampleBodyUrlEncoded, ExampleHeaders, ExampleQueries, Examples, Files,
    FlowVariables, Flows, Folders, HttpAsserts, HttpBodyForms, HttpBodyRaws, HttpBodyUrlEncoded,
    HttpHeaders, HttpSearchParams, Https, Nodes, ResponseAsserts, ResponseHeaders, Responses,
    Variables, WorkspaceUsers, Workspaces, secret_table,
};
use super::{ReadScope, StoreError, Table};
use crate::id::Id;
use crate::model::{
    Credential, CredentialSecret, Endpoint, Environment, Example, Folder, Variable, Workspace,
    WorkspaceRole, WorkspaceUser,
};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// GENERIC ACCESS
// =============================================================================

/// Fetch one row, `None` when absent.
pub fn find<T: Table>(scope: &impl ReadScope, id: Id) -> Result<Option<T::Model>, StoreError> {
    scope
        .fetch(T::ROWS, id.to_key())?
        .map(|bytes| T::decode(&bytes))
        .transpose()
}

/// Fetch one row, `NotFound` when absent.
pub fn get<T: Table>(scope: &impl ReadScope, id: Id) -> Result<T::Model, StoreError> {
    find::<T>(scope, id)?.ok_or(StoreError::NotFound {
        table: T::NAME,
        id,
    })
}

pub fn exists<T: Table>(scope: &impl ReadScope, id: Id) -> Result<bool, StoreError> {
    Ok(scope.fetch(T::ROWS, id.to_key())?.is_some())
}

/// Every row whose parent is `parent`, in ID order.
pub fn list_by<T: Table>(scope: &impl ReadScope, parent: Id) -> Result<Vec<T::Model>, StoreError> {
    let Some(index) = T::BY_PARENT else {
        return Err(StoreError::Corrupt(format!("{} has no parent index", T::NAME)));
    };
    let mut out = Vec::new();
    for key in scope.fetch_children(index, parent.to_key())? {
        match scope.fetch(T::ROWS, key)? {
            Some(bytes) => out.push(T::decode(&bytes)?),
            None => {
                return Err(StoreError::Corrupt(format!(
                    "{} index points at missing row {}",
                    T::NAME,
                    Id::from_key(key)
                )));
            }
        }
    }
    Ok(out)
}

/// Every row of the table, in ID order.
pub fn scan<T: Table>(scope: &impl ReadScope) -> Result<Vec<T::Model>, StoreError> {
    scope
        .fetch_all(T::ROWS)?
        .iter()
        .map(|bytes| T::decode(bytes))
        .collect()
}

// =============================================================================
// OWNERSHIP
// =============================================================================

/// A row kind that belongs to exactly one workspace, directly or through
/// its chain of parents.
pub trait Owned: Table {
    /// Workspace of a stored row; `None` when a parent on the chain is gone.
    fn workspace_of(scope: &impl ReadScope, model: &Self::Model) -> Result<Option<Id>, StoreError>;
}

macro_rules! owned {
    (direct: $($marker:ident),+ $(,)?) => {
        $(
            impl Owned for $marker {
                fn workspace_of(_: &impl ReadScope, model: &Self::Model) -> Result<Option<Id>, StoreError> {
                    Ok(Some(model.workspace_id))
                }
            }
        )+
    };
    (via $parent:ident . $field:ident: $($marker:ident),+ $(,)?) => {
        $(
            impl Owned for $marker {
                fn workspace_of(scope: &impl ReadScope, model: &Self::Model) -> Result<Option<Id>, StoreError> {
                    match find::<$parent>(scope, model.$field)? {
                        Some(parent) => $parent::workspace_of(scope, &parent),
                        None => Ok(None),
                    }
                }
            }
        )+
    };
}

owned!(direct: Collections, Https, Files, Flows, Environments, Credentials);
owned!(via Collections.collection_id: Folders, Endpoints, Examples);
owned!(via Examples.example_id:
    ExampleHeaders, ExampleQueries, ExampleBodyForms, ExampleBodyUrlEncoded,
    ExampleAsserts, ExampleBodyRaws, Responses,
);
owned!(via Responses.response_id: ResponseHeaders, ResponseAsserts);
owned!(via Https.http_id:
    HttpHeaders, HttpSearchParams, HttpBodyForms, HttpBodyUrlEncoded, HttpBodyRaws, HttpAsserts,
);
owned!(via Flows.flow_id: FlowVariables, Nodes, Edges);
owned!(via Environments.env_id: Variables);

// =============================================================================
// LINKED LISTS
// =============================================================================

/// A row that is a member of a per-parent doubly-linked list.
pub trait Linked {
    fn id(&self) -> Id;
    fn prev(&self) -> Option<Id>;
    fn next(&self) -> Option<Id>;
    fn set_links(&mut self, prev: Option<Id>, next: Option<Id>);

    /// Tiebreaker for rows whose links do not determine a position.
    fn display_order(&self) -> f64 {
        0.0
    }

    fn set_display_order(&mut self, _order: f64) {}
}

macro_rules! linked {
    ($model:ty) => {
        impl Linked for $model {
            fn id(&self) -> Id {
                self.id
            }
            fn prev(&self) -> Option<Id> {
                self.prev
            }
            fn next(&self) -> Option<Id> {
                self.next
            }
            fn set_links(&mut self, prev: Option<Id>, next: Option<Id>) {
                self.prev = prev;
                self.next = next;
            }
        }
    };
    ($model:ty, ordered) => {
        impl Linked for $model {
            fn id(&self) -> Id {
                self.id
            }
            fn prev(&self) -> Option<Id> {
                self.prev
            }
            fn next(&self) -> Option<Id> {
                self.next
            }
            fn set_links(&mut self, prev: Option<Id>, next: Option<Id>) {
                self.prev = prev;
                self.next = next;
            }
            fn display_order(&self) -> f64 {
                self.display_order
            }
            fn set_display_order(&mut self, order: f64) {
                self.display_order = order;
            }
        }
    };
}

linked!(Environment, ordered);
linked!(Variable, ordered);
linked!(Example);
linked!(Folder);
linked!(Endpoint);

/// Resolve rows into list order.
///
/// Heads (no `prev`, or a `prev` outside the set) are walked through `next`
/// in `(display_order, id)` order. Rows left unvisited by a broken or
/// cyclic chain are appended in the same order, so every row appears once.
pub fn order_linked<T: Linked>(mut items: Vec<T>) -> Vec<T> {
    items.sort_by(|a, b| {
        a.display_order()
            .total_cmp(&b.display_order())
            .then_with(|| a.id().cmp(&b.id()))
    });

    let position: BTreeMap<Id, usize> = items.iter().enumerate().map(|(i, t)| (t.id(), i)).collect();
    let mut visited = vec![false; items.len()];
    let mut order = Vec::with_capacity(items.len());

    let heads: Vec<usize> = (0..items.len())
        .filter(|&i| items[i].prev().is_none_or(|p| !position.contains_key(&p)))
        .collect();

    for head in heads {
        let mut cursor = Some(head);
        while let Some(i) = cursor {
            if visited[i] {
                break;
            }
            visited[i] = true;
            order.push(i);
            cursor = items[i].next().and_then(|n| position.get(&n).copied());
        }
    }
    order.extend((0..items.len()).filter(|&i| !visited[i]));

    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    order.into_iter().filter_map(|i| slots[i].take()).collect()
}

pub fn environments_ordered(scope: &impl ReadScope, workspace_id: Id) -> Result<Vec<Environment>, StoreError> {
    Ok(order_linked(list_by::<Environments>(scope, workspace_id)?))
}

pub fn variables_ordered(scope: &impl ReadScope, env_id: Id) -> Result<Vec<Variable>, StoreError> {
    Ok(order_linked(list_by::<Variables>(scope, env_id)?))
}

pub fn examples_ordered(scope: &impl ReadScope, endpoint_id: Id) -> Result<Vec<Example>, StoreError> {
    Ok(order_linked(list_by::<Examples>(scope, endpoint_id)?))
}

pub fn folders_ordered(scope: &impl ReadScope, collection_id: Id) -> Result<Vec<Folder>, StoreError> {
    Ok(order_linked(list_by::<Folders>(scope, collection_id)?))
}

// =============================================================================
// CREDENTIALS
// =============================================================================

/// The sealed side-table row of `credential`, looked up in its kind's table.
pub fn secret_for(scope: &impl ReadScope, credential: &Credential) -> Result<Option<CredentialSecret>, StoreError> {
    use crate::mapper::Mapped;

    scope
        .fetch(secret_table(credential.kind), credential.id.to_key())?
        .map(|bytes| {
            let row = postcard::from_bytes(&bytes).map_err(|e| StoreError::Codec(e.to_string()))?;
            Ok(CredentialSecret::from_row(row)?)
        })
        .transpose()
}

// =============================================================================
// MEMBERSHIP
// =============================================================================

/// Membership row of `user_id` in `workspace_id`, if any.
pub fn membership(scope: &impl ReadScope, workspace_id: Id, user_id: Id) -> Result<Option<WorkspaceUser>, StoreError> {
    Ok(list_by::<WorkspaceUsers>(scope, user_id)?
        .into_iter()
        .find(|m| m.workspace_id == workspace_id))
}

pub fn is_member(scope: &impl ReadScope, workspace_id: Id, user_id: Id) -> Result<bool, StoreError> {
    Ok(membership(scope, workspace_id, user_id)?.is_some())
}

pub fn is_owner(scope: &impl ReadScope, workspace_id: Id, user_id: Id) -> Result<bool, StoreError> {
    Ok(membership(scope, workspace_id, user_id)?.is_some_and(|m| m.role == WorkspaceRole::Owner))
}

/// Workspaces `user_id` belongs to, in ID order.
pub fn workspaces_for_user(scope: &impl ReadScope, user_id: Id) -> Result<Vec<Workspace>, StoreError> {
    let ids: BTreeSet<Id> = list_by::<WorkspaceUsers>(scope, user_id)?
        .into_iter()
        .map(|m| m.workspace_id)
        .collect();
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(ws) = find::<Workspaces>(scope, id)? {
            out.push(ws);
        }
    }
    Ok(out)
}

/// Every member of `workspace_id`.
pub fn members_of(scope: &impl ReadScope, workspace_id: Id) -> Result<Vec<WorkspaceUser>, StoreError> {
    Ok(scan::<WorkspaceUsers>(scope)?
        .into_iter()
        .filter(|m| m.workspace_id == workspace_id)
        .collect())
}

/// Credentials of every workspace `user_id` belongs to.
pub fn credentials_for_user(scope: &impl ReadScope, user_id: Id) -> Result<Vec<Credential>, StoreError> {
    let mut out = Vec::new();
    for ws in workspaces_for_user(scope, user_id)? {
        out.extend(list_by::<Credentials>(scope, ws.id)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(order: f64) -> Environment {
        let mut env = Environment::new(Id::NIL, "e");
        env.display_order = order;
        env
    }

    fn chain(mut items: Vec<Environment>) -> Vec<Environment> {
        let ids: Vec<Id> = items.iter().map(|e| e.id).collect();
        for (i, item) in items.iter_mut().enumerate() {
            let prev = i.checked_sub(1).map(|p| ids[p]);
            let next = ids.get(i + 1).copied();
            item.set_links(prev, next);
        }
        items
    }

    #[test]
    fn follows_links_not_display_order() {
        // linked a -> b -> c but display orders say c, b, a
        let items = chain(vec![env(3.0), env(2.0), env(1.0)]);
        let expected: Vec<Id> = items.iter().map(|e| e.id).collect();

        let mut shuffled = items.clone();
        shuffled.reverse();
        let ordered: Vec<Id> = order_linked(shuffled).iter().map(|e| e.id).collect();
        assert_eq!(ordered, expected);
    }

    #[test]
    fn unlinked_rows_fall_back_to_display_order() {
        let a = env(2.0);
        let b = env(1.0);
        let ordered: Vec<Id> = order_linked(vec![a.clone(), b.clone()]).iter().map(|e| e.id).collect();
        assert_eq!(ordered, vec![b.id, a.id]);
    }

    #[test]
    fn cycles_still_yield_every_row_once() {
        let mut items = chain(vec![env(0.0), env(1.0), env(2.0)]);
        let first = items[0].id;
        let last = items[2].id;
        items[0].prev = Some(last);
        items[2].next = Some(first);

        let ordered = order_linked(items);
        assert_eq!(ordered.len(), 3);
        let unique: BTreeSet<Id> = ordered.iter().map(|e| e.id).collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn ordering_is_stable_across_calls() {
        let items = chain(vec![env(0.0), env(0.0), env(0.0)]);
        let first: Vec<Id> = order_linked(items.clone()).iter().map(|e| e.id).collect();
        let second: Vec<Id> = order_linked(items).iter().map(|e| e.id).collect();
        assert_eq!(first, second);
    }
}
