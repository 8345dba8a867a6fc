use std::sync::Arc;

use folderseed::error::{ApiError, GatewayError};
use folderseed::gateway::{GatewayOp, InMemoryGateway, StorageGateway};
use folderseed::plan::{PlanStep, TreePlanner};
use folderseed::replication::{
    CancellationFlag, ExecutorState, FailureReason, ReplicationExecutor, ReplicationObserver,
    StepOutcome,
};
use folderseed::tree::{Node, NodeKind, TreeReader};

use crate::integration::support::{
    body, dhf_gateway, fast_options, read, DESTINATION_ID, TEMPLATE_ID,
};

#[tokio::test]
async fn replicates_dhf_template_under_client_name() {
    let gateway = dhf_gateway();
    let tree = read(&gateway, TEMPLATE_ID).await;
    let plan = TreePlanner::plan(&tree, "Acme Medical");

    let mut executor = ReplicationExecutor::new(gateway.clone(), fast_options(1));
    let result = executor.execute(&plan, DESTINATION_ID).await.unwrap();

    assert_eq!(executor.state(), ExecutorState::Completed);
    assert!(result.is_clean());
    assert_eq!(result.root_name, "Acme Medical");
    assert_eq!(result.created_folders, tree.folder_count());
    assert_eq!(result.copied_files, tree.file_count());
    assert_eq!(result.total_steps, plan.len());

    let copy = gateway.outline(&result.root_destination_id);
    assert_eq!(copy[0].1, "Acme Medical");
    assert_eq!(body(copy), body(gateway.outline(TEMPLATE_ID)));

    // The template itself is never written to.
    assert!(gateway
        .calls()
        .iter()
        .filter_map(|c| c.parent_id.as_deref())
        .all(|p| tree.get(p).is_none()));
}

#[tokio::test]
async fn empty_template_creates_only_the_root() {
    let gateway = InMemoryGateway::new();
    gateway.add_folder(TEMPLATE_ID, "Empty", None);
    gateway.add_folder(DESTINATION_ID, "Clients", None);
    let gateway = Arc::new(gateway);

    let tree = read(&gateway, TEMPLATE_ID).await;
    let plan = TreePlanner::plan(&tree, "Solo");
    assert_eq!(plan.len(), 1);

    let result = ReplicationExecutor::new(gateway.clone(), fast_options(1))
        .execute(&plan, DESTINATION_ID)
        .await
        .unwrap();
    assert_eq!(result.created_folders, 1);
    assert_eq!(result.copied_files, 0);
    assert_eq!(gateway.children_of(DESTINATION_ID).len(), 1);
}

#[tokio::test]
async fn duplicate_sibling_names_are_preserved() {
    let gateway = InMemoryGateway::new();
    gateway.add_folder(TEMPLATE_ID, "Template", None);
    gateway.add_file("a", "Notes.docx", TEMPLATE_ID);
    gateway.add_file("b", "Notes.docx", TEMPLATE_ID);
    gateway.add_folder(DESTINATION_ID, "Clients", None);
    let gateway = Arc::new(gateway);

    let tree = read(&gateway, TEMPLATE_ID).await;
    let result = ReplicationExecutor::new(gateway.clone(), fast_options(1))
        .execute(&TreePlanner::plan(&tree, "Acme"), DESTINATION_ID)
        .await
        .unwrap();

    let names: Vec<String> = gateway
        .children_of(&result.root_destination_id)
        .into_iter()
        .map(|n| n.name)
        .collect();
    assert_eq!(names, vec!["Notes.docx", "Notes.docx"]);
}

#[tokio::test]
async fn failed_subfolder_skips_only_its_subtree() {
    let gateway = dhf_gateway();
    gateway.fail_always(
        GatewayOp::CreateFolder,
        "02 Design Inputs",
        GatewayError::PermissionDenied("insufficient permissions".to_string()),
    );
    let tree = read(&gateway, TEMPLATE_ID).await;
    let result = ReplicationExecutor::new(gateway.clone(), fast_options(1))
        .execute(&TreePlanner::plan(&tree, "Acme"), DESTINATION_ID)
        .await
        .unwrap();

    assert_eq!(result.state, ExecutorState::CompletedWithFailures);
    let inputs = result.failure_for("inputs").unwrap();
    assert_eq!(inputs.attempts, 1);
    assert!(matches!(
        inputs.reason,
        FailureReason::Gateway(GatewayError::PermissionDenied(_))
    ));
    for skipped in ["reqs", "srs"] {
        let failure = result.failure_for(skipped).unwrap();
        assert_eq!(failure.reason, FailureReason::ParentUnavailable);
        assert_eq!(failure.attempts, 0);
    }
    // Siblings after the failure still replicate.
    assert!(result.failure_for("empty").is_none());
    assert!(result.failure_for("readme").is_none());
    assert_eq!(gateway.call_count(GatewayOp::CreateFolder, "Requirements"), 0);
    assert_eq!(
        result.created_folders + result.copied_files + result.failures.len(),
        result.total_steps
    );
}

#[tokio::test]
async fn transient_errors_are_retried_until_success() {
    let gateway = dhf_gateway();
    gateway.fail_times(
        GatewayOp::CopyFile,
        "srs",
        GatewayError::Transient("connection reset".to_string()),
        2,
    );
    let tree = read(&gateway, TEMPLATE_ID).await;
    let result = ReplicationExecutor::new(gateway.clone(), fast_options(1))
        .execute(&TreePlanner::plan(&tree, "Acme"), DESTINATION_ID)
        .await
        .unwrap();

    assert!(result.is_clean());
    assert_eq!(gateway.call_count(GatewayOp::CopyFile, "SRS.xlsx"), 3);
}

#[tokio::test]
async fn unreadable_template_creates_nothing() {
    let gateway = dhf_gateway();
    gateway.fail_always(
        GatewayOp::ListChildren,
        "inputs",
        GatewayError::PermissionDenied("no access".to_string()),
    );
    let err = TreeReader::new(gateway.clone())
        .read(TEMPLATE_ID)
        .await
        .unwrap_err();
    match err {
        ApiError::SourceRead { folder_id, source } => {
            assert_eq!(folder_id, "inputs");
            assert!(matches!(source, GatewayError::PermissionDenied(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(gateway
        .calls()
        .iter()
        .all(|c| !matches!(c.op, GatewayOp::CreateFolder | GatewayOp::CopyFile)));
}

#[tokio::test]
async fn cyclic_listing_is_rejected() {
    let gateway = dhf_gateway();
    gateway.inject_listing(
        "reqs",
        vec![Node::folder("inputs", "02 Design Inputs", Some("reqs"))],
    );
    let err = TreeReader::new(gateway).read(TEMPLATE_ID).await.unwrap_err();
    assert!(matches!(err, ApiError::MalformedTree(_)));
}

#[tokio::test]
async fn max_depth_guard_stops_deep_trees() {
    let gateway = dhf_gateway();
    let err = TreeReader::new(gateway.clone())
        .with_max_depth(1)
        .read(TEMPLATE_ID)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::MalformedTree(_)));
    assert!(TreeReader::new(gateway).with_max_depth(2).read(TEMPLATE_ID).await.is_ok());
}

#[tokio::test]
async fn rate_limited_root_is_retried_then_fatal() {
    let gateway = dhf_gateway();
    gateway.fail_always(
        GatewayOp::CreateFolder,
        "Acme",
        GatewayError::rate_limited("userRateLimitExceeded"),
    );
    let tree = read(&gateway, TEMPLATE_ID).await;
    let mut executor = ReplicationExecutor::new(gateway.clone(), fast_options(1));
    let err = executor
        .execute(&TreePlanner::plan(&tree, "Acme"), DESTINATION_ID)
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::RootCreation { .. }));
    assert_eq!(executor.state(), ExecutorState::Failed);
    assert_eq!(gateway.call_count(GatewayOp::CreateFolder, "Acme"), 3);
    assert_eq!(gateway.calls().iter().filter(|c| c.op == GatewayOp::CopyFile).count(), 0);
}

/// Cancels once the given number of steps have completed.
struct CancelAfter {
    flag: CancellationFlag,
    after: usize,
}

impl ReplicationObserver for CancelAfter {
    fn on_step_completed(&self, index: usize, _step: &PlanStep, _outcome: &StepOutcome) {
        if index + 1 >= self.after {
            self.flag.cancel();
        }
    }
}

#[tokio::test]
async fn cancellation_keeps_completed_work() {
    let gateway = dhf_gateway();
    let tree = read(&gateway, TEMPLATE_ID).await;
    let plan = TreePlanner::plan(&tree, "Acme");
    let flag = CancellationFlag::new();

    let mut executor = ReplicationExecutor::new(gateway.clone(), fast_options(1))
        .with_cancellation(flag.clone())
        .with_observer(Arc::new(CancelAfter {
            flag: flag.clone(),
            after: 3,
        }));
    let result = executor.execute(&plan, DESTINATION_ID).await.unwrap();

    assert!(result.cancelled);
    assert_eq!(executor.state(), ExecutorState::Cancelled);
    assert_eq!(result.created_folders + result.copied_files, 3);
    assert_eq!(result.unattempted_steps(), plan.len() - 3);
    assert_eq!(gateway.outline(&result.root_destination_id).len(), 3);
}

#[tokio::test]
async fn rerun_creates_a_second_independent_workspace() {
    let gateway = dhf_gateway();
    let tree = read(&gateway, TEMPLATE_ID).await;
    let plan = TreePlanner::plan(&tree, "Acme");

    let first = ReplicationExecutor::new(gateway.clone(), fast_options(1))
        .execute(&plan, DESTINATION_ID)
        .await
        .unwrap();
    let second = ReplicationExecutor::new(gateway.clone(), fast_options(1))
        .execute(&plan, DESTINATION_ID)
        .await
        .unwrap();

    assert_ne!(first.root_destination_id, second.root_destination_id);
    assert_eq!(gateway.children_of(DESTINATION_ID).len(), 2);
    let node = gateway
        .get_metadata(&second.root_destination_id)
        .await
        .unwrap();
    assert_eq!(node.kind, NodeKind::Folder);
    assert_eq!(node.parent_id.as_deref(), Some(DESTINATION_ID));
}
