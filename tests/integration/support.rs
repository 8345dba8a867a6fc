use std::sync::Arc;
use std::time::Duration;

use folderseed::gateway::InMemoryGateway;
use folderseed::replication::{ExecutorOptions, RetryPolicy};
use folderseed::tree::{NodeKind, SourceTree, TreeReader};
use proptest::prelude::*;

pub const TEMPLATE_ID: &str = "tmpl";
pub const DESTINATION_ID: &str = "clients";

/// One generated node: (parent choice, is_folder, name). The parent choice is
/// reduced modulo the folders generated so far, so every shape is a valid tree.
pub type ShapeEntry = (usize, bool, String);

pub fn fast_options(concurrency: usize) -> ExecutorOptions {
    ExecutorOptions {
        retry: RetryPolicy::immediate(3),
        concurrency,
        pacing: Duration::ZERO,
    }
}

/// The design-history template most scenarios start from.
pub fn dhf_gateway() -> Arc<InMemoryGateway> {
    let gateway = InMemoryGateway::new();
    gateway.add_folder(TEMPLATE_ID, "DHF Template", None);
    gateway.add_folder("plans", "01 Plans", Some(TEMPLATE_ID));
    gateway.add_file("qp", "Quality Plan.docx", "plans");
    gateway.add_file("rmp", "Risk Management Plan.docx", "plans");
    gateway.add_folder("inputs", "02 Design Inputs", Some(TEMPLATE_ID));
    gateway.add_folder("reqs", "Requirements", Some("inputs"));
    gateway.add_file("srs", "SRS.xlsx", "reqs");
    gateway.add_folder("empty", "03 Verification", Some(TEMPLATE_ID));
    gateway.add_file("readme", "README.pdf", TEMPLATE_ID);
    gateway.add_folder(DESTINATION_ID, "Clients", None);
    Arc::new(gateway)
}

/// Seed `gateway` with the template described by `shape` and return the ids in
/// creation order (index 0 is the template root).
pub fn seed_shape(gateway: &InMemoryGateway, shape: &[ShapeEntry]) -> Vec<String> {
    gateway.add_folder(TEMPLATE_ID, "Template", None);
    gateway.add_folder(DESTINATION_ID, "Clients", None);
    let mut ids = vec![TEMPLATE_ID.to_string()];
    let mut folders = vec![TEMPLATE_ID.to_string()];
    for (index, (parent_choice, is_folder, name)) in shape.iter().enumerate() {
        let parent = folders[parent_choice % folders.len()].clone();
        let id = format!("n{}", index);
        if *is_folder {
            gateway.add_folder(&id, name, Some(&parent));
            folders.push(id.clone());
        } else {
            gateway.add_file(&id, name, &parent);
        }
        ids.push(id);
    }
    ids
}

pub fn gateway_for_shape(shape: &[ShapeEntry]) -> Arc<InMemoryGateway> {
    let gateway = InMemoryGateway::new();
    seed_shape(&gateway, shape);
    Arc::new(gateway)
}

/// Names are drawn from a small pool so siblings often collide.
pub fn shape_strategy(max_nodes: usize) -> impl Strategy<Value = Vec<ShapeEntry>> {
    let name = prop::sample::select(vec![
        "Plans", "Inputs", "Notes.docx", "Notes.docx", "Budget.xlsx", "Archive", "é 日本",
    ])
    .prop_map(str::to_string);
    prop::collection::vec((any::<usize>(), any::<bool>(), name), 0..max_nodes)
}

pub async fn read(gateway: &Arc<InMemoryGateway>, root: &str) -> SourceTree {
    TreeReader::new(gateway.clone()).read(root).await.unwrap()
}

/// Outline with the root name dropped, for comparing a copy with its template.
pub fn body(outline: Vec<(usize, String, NodeKind)>) -> Vec<(usize, String, NodeKind)> {
    outline.into_iter().skip(1).collect()
}

pub fn sorted(mut outline: Vec<(usize, String, NodeKind)>) -> Vec<(usize, String, NodeKind)> {
    outline.sort_by(|a, b| (a.0, &a.1, a.2.as_str()).cmp(&(b.0, &b.1, b.2.as_str())));
    outline
}

pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}
