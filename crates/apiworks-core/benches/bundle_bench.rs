//! # Bundle Benchmarks
//!
//! Filter, layout, encoding and store export over synthetic workspaces.
//!
//! Run with: `cargo bench -p apiworks-core`

use apiworks_core::model::{
    Collection, Edge, Endpoint, Example, Flow, Node, NodeKind, NodePayload, NoopKind, NoopNode,
    RequestNode, Workspace,
};
use apiworks_core::storage::tables::Workspaces;
use apiworks_core::storage::writer;
use apiworks_core::{
    Bundle, ExportFormat, ExportOptions, Id, ImportOptions, LayoutConfig, Store, encode,
    ensure_flow_structure, export_workspace, filter_by_examples, import_bundle,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::collections::BTreeSet;
use std::hint::black_box;
use std::sync::atomic::AtomicBool;

/// One flow whose request nodes form a chain, one example per request.
fn create_chain_bundle(size: usize) -> (Bundle, Vec<Id>) {
    let ws = Workspace::new("bench");
    let mut bundle = Bundle::new(ws.clone());
    let collection = Collection {
        id: Id::new_now(),
        workspace_id: ws.id,
        name: "bench".into(),
        updated: 0,
    };
    let endpoint = Endpoint {
        id: Id::new_now(),
        collection_id: collection.id,
        folder_id: None,
        name: "endpoint".into(),
        url: "/bench".into(),
        method: "GET".into(),
        prev: None,
        next: None,
    };
    let flow = Flow::new(ws.id, "chain");
    let start = Node::new(flow.id, "Start", NodeKind::NoOp);
    bundle.push_payload(NodePayload::NoOp(NoopNode {
        flow_node_id: start.id,
        kind: NoopKind::Start,
    }));

    let mut examples = Vec::with_capacity(size);
    let mut previous = start.id;
    bundle.nodes.push(start);
    for i in 0..size {
        let example = Example::new(&endpoint, format!("example {i}"));
        let node = Node::new(flow.id, format!("request {i}"), NodeKind::Request);
        bundle.push_payload(NodePayload::Request(RequestNode {
            flow_node_id: node.id,
            endpoint_id: Some(endpoint.id),
            example_id: Some(example.id),
            ..RequestNode::default()
        }));
        bundle.edges.push(Edge::then(flow.id, previous, node.id));
        previous = node.id;
        examples.push(example.id);
        bundle.examples.push(example);
        bundle.nodes.push(node);
    }
    bundle.flows.push(flow);
    bundle.endpoints.push(endpoint);
    bundle.collections.push(collection);
    (bundle, examples)
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_by_examples");

    for size in [100, 500, 1000].iter() {
        let (bundle, examples) = create_chain_bundle(*size);
        let wanted: BTreeSet<Id> = examples.iter().step_by(10).copied().collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &wanted, |b, wanted| {
            b.iter(|| {
                let mut bundle = bundle.clone();
                let _ = filter_by_examples(&mut bundle, wanted);
                black_box(bundle)
            });
        });
    }

    group.finish();
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("ensure_flow_structure");

    for size in [100, 500, 1000].iter() {
        let (bundle, _) = create_chain_bundle(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut bundle = bundle.clone();
                ensure_flow_structure(&mut bundle, &LayoutConfig::default());
                black_box(bundle)
            });
        });
    }

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let (bundle, _) = create_chain_bundle(500);

    for format in ExportFormat::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(format), &format, |b, &format| {
            b.iter(|| black_box(encode(&bundle, format)));
        });
    }

    group.finish();
}

fn bench_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("export_workspace");

    for size in [100, 500].iter() {
        let (bundle, _) = create_chain_bundle(*size);
        let store = Store::in_memory().expect("store");
        let ws = Workspace::new("target");
        let cancel = AtomicBool::new(false);
        store
            .write_with(|tx| {
                writer::insert::<Workspaces>(tx, &ws)?;
                import_bundle(tx, &bundle, &ImportOptions::into_workspace(ws.id), &cancel)
            })
            .expect("seed store");

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let read = store.read().expect("read");
                black_box(export_workspace(&read, ws.id, &ExportOptions::default(), &cancel))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_filter, bench_layout, bench_encode, bench_export);
criterion_main!(benches);
