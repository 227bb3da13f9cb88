//! # Flow Layout
//!
//! Gives every flow in a bundle a start node and places the nodes reachable
//! from it on a grid.
//!
//! A node's row is its longest-path distance from the start node over the
//! directed edges. Nodes sharing a row are centred on `start_x`, left to
//! right in the order the traversal first discovered them. Unreachable nodes
//! keep their positions and are never wired to the start node.

use crate::bundle::Bundle;
use crate::id::Id;
use crate::model::{Node, NodeKind, NodePayload, NoopKind, NoopNode};
use crate::primitives::{
    LAYOUT_START_X, LAYOUT_START_Y, NODE_SPACING_X, NODE_SPACING_Y, START_NODE_NAME,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub start_x: f64,
    pub start_y: f64,
    pub spacing_x: f64,
    pub spacing_y: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            start_x: LAYOUT_START_X,
            start_y: LAYOUT_START_Y,
            spacing_x: NODE_SPACING_X,
            spacing_y: NODE_SPACING_Y,
        }
    }
}

/// Add missing start nodes and lay out every flow.
///
/// Returns how many start nodes were synthesised.
pub fn ensure_flow_structure(bundle: &mut Bundle, config: &LayoutConfig) -> usize {
    let flows: Vec<Id> = bundle.flows.iter().map(|f| f.id).collect();
    let mut added = 0;
    for flow in flows {
        let start = match bundle.start_node(flow) {
            Some(node) => node.id,
            None => {
                let node = Node::new(flow, START_NODE_NAME, NodeKind::NoOp);
                let id = node.id;
                bundle.push_payload(NodePayload::NoOp(NoopNode {
                    flow_node_id: id,
                    kind: NoopKind::Start,
                }));
                bundle.nodes.push(node);
                added += 1;
                id
            }
        };
        let positions = place(&levels(bundle, flow, start), config);
        for node in bundle.nodes.iter_mut().filter(|n| n.flow_id == flow) {
            if let Some(&(x, y)) = positions.get(&node.id) {
                node.position_x = x;
                node.position_y = y;
            }
        }
    }
    debug!(flows = bundle.flows.len(), starts_added = added, "flows laid out");
    added
}

/// Longest-path level of every node reachable from `start`, in discovery order.
fn levels(bundle: &Bundle, flow: Id, start: Id) -> Vec<(Id, usize)> {
    let mut out_edges: BTreeMap<Id, Vec<Id>> = BTreeMap::new();
    for edge in bundle.edges_of(flow) {
        out_edges.entry(edge.source_id).or_default().push(edge.target_id);
    }
    // A simple path visits each node once; longer levels only come from cycles.
    let cap = bundle.nodes_of(flow).count();

    let mut level: BTreeMap<Id, usize> = BTreeMap::from([(start, 0)]);
    let mut discovered = vec![start];
    let mut queue = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        let next = level[&node] + 1;
        if next >= cap {
            continue;
        }
        for &target in out_edges.get(&node).map(Vec::as_slice).unwrap_or_default() {
            match level.get(&target) {
                None => {
                    discovered.push(target);
                    level.insert(target, next);
                    queue.push_back(target);
                }
                Some(&current) if current < next => {
                    level.insert(target, next);
                    queue.push_back(target);
                }
                Some(_) => {}
            }
        }
    }
    discovered.into_iter().map(|id| (id, level[&id])).collect()
}

fn place(levels: &[(Id, usize)], config: &LayoutConfig) -> BTreeMap<Id, (f64, f64)> {
    let mut rows: BTreeMap<usize, Vec<Id>> = BTreeMap::new();
    for &(id, level) in levels {
        rows.entry(level).or_default().push(id);
    }
    let mut out = BTreeMap::new();
    for (level, row) in rows {
        let y = config.start_y + level as f64 * config.spacing_y;
        let offset = (row.len() as f64 - 1.0) / 2.0;
        for (i, id) in row.into_iter().enumerate() {
            let x = config.start_x + (i as f64 - offset) * config.spacing_x;
            out.insert(id, (x, y));
        }
    }
    out
}
