//! # Property-Based Tests
//!
//! Invariants of the bundle engine checked over generated inputs:
//! export/import round trips, vault sealing, flow layout and ID ordering.

use apiworks_core::model::{
    Credential, CredentialKind, Edge, Environment, Flow, Http, HttpKeyValue, JsNode, Node,
    NodeKind, NodePayload, NoopKind, NoopNode, Variable, Workspace,
};
use apiworks_core::model::CompressType;
use apiworks_core::storage::tables::{
    Credentials, Edges, Flows, HttpHeaders, Https, JsNodes, Nodes, NoopNodes, Workspaces,
};
use apiworks_core::storage::writer;
use apiworks_core::{
    Bundle, EncryptionType, ExportOptions, Id, ImportOptions, LayoutConfig, Store, StoreError, Vault,
    VaultError, ensure_flow_structure, export_workspace, import_bundle,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;

// =============================================================================
// FIXTURES
// =============================================================================

#[derive(Debug, Clone)]
struct Shape {
    flows: usize,
    nodes_per_flow: usize,
    environments: usize,
    variables: usize,
    https: usize,
    headers: usize,
}

fn shape() -> impl Strategy<Value = Shape> {
    (0usize..4, 0usize..5, 0usize..3, 0usize..4, 0usize..4, 0usize..3).prop_map(
        |(flows, nodes_per_flow, environments, variables, https, headers)| Shape {
            flows,
            nodes_per_flow,
            environments,
            variables,
            https,
            headers,
        },
    )
}

/// Flows are chains Start -> js -> js ...; every request gets `headers` headers.
fn seed(ws: &Workspace, shape: &Shape) -> Bundle {
    let mut bundle = Bundle::new(ws.clone());
    for f in 0..shape.flows {
        let flow = Flow::new(ws.id, format!("flow {f}"));
        let start = Node::new(flow.id, "Start", NodeKind::NoOp);
        bundle.push_payload(NodePayload::NoOp(NoopNode {
            flow_node_id: start.id,
            kind: NoopKind::Start,
        }));
        let mut previous = start.id;
        bundle.nodes.push(start);
        for n in 0..shape.nodes_per_flow {
            let node = Node::new(flow.id, format!("js {n}"), NodeKind::Js);
            bundle.push_payload(NodePayload::Js(JsNode {
                flow_node_id: node.id,
                code: format!("return {n};").into_bytes(),
                compress_type: CompressType::None,
            }));
            bundle.edges.push(Edge::then(flow.id, previous, node.id));
            previous = node.id;
            bundle.nodes.push(node);
        }
        bundle.flows.push(flow);
    }
    for e in 0..shape.environments {
        let env = Environment::new(ws.id, format!("env {e}"));
        for v in 0..shape.variables {
            bundle.variables.push(Variable::new(env.id, format!("k{v}"), format!("v{v}")));
        }
        bundle.environments.push(env);
    }
    for h in 0..shape.https {
        let http = Http::new(ws.id, format!("req {h}"), "GET", format!("/r/{h}"));
        for k in 0..shape.headers {
            bundle.http_headers.push(HttpKeyValue::new(http.id, format!("x-h{k}"), "1"));
        }
        bundle.https.push(http);
    }
    bundle
}

fn store_with(workspaces: &[&Workspace]) -> Store {
    let store = Store::in_memory().expect("store");
    store
        .write_with(|tx| {
            for ws in workspaces {
                writer::insert::<Workspaces>(tx, ws)?;
            }
            Ok::<_, apiworks_core::StoreError>(())
        })
        .expect("workspaces");
    store
}

fn export(store: &Store, ws: Id) -> Bundle {
    export_with(store, ws, &ExportOptions::default())
}

fn export_with(store: &Store, ws: Id, options: &ExportOptions) -> Bundle {
    let read = store.read().expect("read");
    export_workspace(&read, ws, options, &AtomicBool::new(false)).expect("export")
}

/// Write a seeded bundle row by row through the writer, so the source
/// workspace holds no file entries at all.
fn write_rows(store: &Store, bundle: &Bundle) {
    store
        .write_with(|tx| {
            for flow in &bundle.flows {
                writer::insert::<Flows>(tx, flow)?;
            }
            for node in &bundle.nodes {
                writer::insert::<Nodes>(tx, node)?;
            }
            for edge in &bundle.edges {
                writer::insert::<Edges>(tx, edge)?;
            }
            for payload in bundle.payloads() {
                match payload {
                    NodePayload::NoOp(p) => writer::insert::<NoopNodes>(tx, &p)?,
                    NodePayload::Js(p) => writer::insert::<JsNodes>(tx, &p)?,
                    _ => {}
                }
            }
            for env in &bundle.environments {
                writer::append_environment(tx, env)?;
            }
            for var in &bundle.variables {
                writer::append_variable(tx, var)?;
            }
            for http in &bundle.https {
                writer::insert::<Https>(tx, http)?;
            }
            for header in &bundle.http_headers {
                writer::insert::<HttpHeaders>(tx, header)?;
            }
            for credential in &bundle.credentials {
                writer::insert::<Credentials>(tx, credential)?;
            }
            Ok::<_, StoreError>(())
        })
        .expect("rows");
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Export, import into a fresh workspace and export again keeps every count.
    #[test]
    fn round_trip_preserves_counts(shape in shape()) {
        let source = Workspace::new("source");
        let target = Workspace::new("target");
        let store = store_with(&[&source, &target]);
        let cancel = AtomicBool::new(false);

        store
            .write_with(|tx| import_bundle(tx, &seed(&source, &shape), &ImportOptions::into_workspace(source.id), &cancel))
            .expect("seed");
        let first = export(&store, source.id);

        let result = store
            .write_with(|tx| import_bundle(tx, &first, &ImportOptions::into_workspace(target.id), &cancel))
            .expect("import");
        let second = export(&store, target.id);

        prop_assert_eq!(first.count_entities(), second.count_entities());

        // Edges map onto edges under the node ID rewrite.
        let mapped: Vec<(Id, Id)> = first
            .edges
            .iter()
            .map(|e| (result.id_maps.node[&e.source_id], result.id_maps.node[&e.target_id]))
            .collect();
        for (source_id, target_id) in mapped {
            prop_assert!(second.edges.iter().any(|e| e.source_id == source_id && e.target_id == target_id));
        }

        let names = |b: &Bundle| b.flows.iter().map(|f| f.name.clone()).collect::<Vec<_>>();
        prop_assert_eq!(names(&first), names(&second));
    }

    /// Rows written outside the importer round-trip with the same counts:
    /// a default import adds no file entries the source never had.
    #[test]
    fn round_trip_from_written_rows_preserves_counts(shape in shape(), credentials in 0usize..3) {
        let source = Workspace::new("source");
        let target = Workspace::new("target");
        let store = store_with(&[&source, &target]);
        let cancel = AtomicBool::new(false);

        let mut rows = seed(&source, &shape);
        for c in 0..credentials {
            rows.credentials.push(Credential::new(source.id, format!("key {c}"), CredentialKind::OpenAi));
        }
        write_rows(&store, &rows);

        let first = export_with(&store, source.id, &ExportOptions::everything());
        prop_assert!(first.files.is_empty());

        store
            .write_with(|tx| import_bundle(tx, &first, &ImportOptions::into_workspace(target.id), &cancel))
            .expect("import");
        let second = export_with(&store, target.id, &ExportOptions::everything());

        prop_assert_eq!(first.count_entities(), second.count_entities());
        prop_assert!(second.files.is_empty());
    }

    /// Sealed secrets open to the same bytes, under either algorithm.
    #[test]
    fn vault_round_trip(
        key in vec(any::<u8>(), 32),
        plaintext in vec(any::<u8>(), 0..256),
        aes in any::<bool>()
    ) {
        let algorithm = if aes { EncryptionType::Aes256Gcm } else { EncryptionType::XChaCha20Poly1305 };
        let vault = Vault::new(&key).expect("vault");

        let a = vault.encrypt(&plaintext, algorithm).expect("encrypt");
        let b = vault.encrypt(&plaintext, algorithm).expect("encrypt");
        prop_assert_ne!(&a, &b);
        prop_assert_eq!(vault.decrypt(&a, algorithm).expect("decrypt"), plaintext);
    }

    /// Any flipped ciphertext byte fails authentication.
    #[test]
    fn vault_detects_tampering(
        plaintext in vec(any::<u8>(), 1..128),
        position in any::<prop::sample::Index>(),
        aes in any::<bool>()
    ) {
        let algorithm = if aes { EncryptionType::Aes256Gcm } else { EncryptionType::XChaCha20Poly1305 };
        let vault = Vault::default();
        let mut sealed = vault.encrypt(&plaintext, algorithm).expect("encrypt");
        let i = position.index(sealed.len());
        sealed[i] ^= 0x01;
        prop_assert_eq!(vault.decrypt(&sealed, algorithm), Err(VaultError::AuthFailed));
    }

    /// Every reachable node sits on the row of its longest path from Start.
    #[test]
    fn layout_rows_are_longest_paths(
        size in 2usize..12,
        raw_edges in vec((0usize..12, 0usize..12), 0..30)
    ) {
        let ws = Workspace::new("layout");
        let mut bundle = Bundle::new(ws.clone());
        let flow = Flow::new(ws.id, "f");
        let nodes: Vec<Node> = (0..size)
            .map(|i| Node::new(flow.id, format!("n{i}"), if i == 0 { NodeKind::NoOp } else { NodeKind::Js }))
            .collect();
        bundle.push_payload(NodePayload::NoOp(NoopNode { flow_node_id: nodes[0].id, kind: NoopKind::Start }));

        // forward edges only, so the graph is acyclic
        let pairs: Vec<(usize, usize)> = raw_edges
            .into_iter()
            .map(|(a, b)| (a % size, b % size))
            .filter(|(a, b)| a < b)
            .collect();
        for &(a, b) in &pairs {
            bundle.edges.push(Edge::then(flow.id, nodes[a].id, nodes[b].id));
        }
        bundle.nodes = nodes.clone();
        bundle.flows.push(flow);

        let mut level: BTreeMap<usize, usize> = BTreeMap::from([(0, 0)]);
        for j in 1..size {
            let best = pairs
                .iter()
                .filter(|(_, b)| *b == j)
                .filter_map(|(a, _)| level.get(a).map(|l| l + 1))
                .max();
            if let Some(l) = best {
                level.insert(j, l);
            }
        }

        let config = LayoutConfig::default();
        prop_assert_eq!(ensure_flow_structure(&mut bundle, &config), 0);
        for (index, l) in level {
            let node = bundle.get_node_by_id(nodes[index].id).expect("node");
            prop_assert_eq!(node.position_y, l as f64 * config.spacing_y);
        }
        prop_assert_eq!(bundle.edges.len(), pairs.len());
    }

    /// Later IDs sort after earlier ones, as IDs and as storage keys.
    #[test]
    fn ids_are_time_ordered(count in 2usize..64) {
        let ids: Vec<Id> = (0..count).map(|_| Id::new_now()).collect();
        for pair in ids.windows(2) {
            prop_assert!(pair[0] < pair[1]);
            prop_assert!(pair[0].to_key() < pair[1].to_key());
        }
        for id in &ids {
            prop_assert_eq!(Id::from_key(id.to_key()), *id);
            prop_assert_eq!(id.to_string().parse::<Id>().expect("parse"), *id);
        }
    }
}
