use std::sync::Arc;

use folderseed::error::GatewayError;
use folderseed::gateway::GatewayOp;
use folderseed::plan::{PlanStep, TreePlanner};
use folderseed::replication::{
    ExecutorState, FailureReason, ReplicationExecutor, ReplicationObserver, StepOutcome,
};
use parking_lot::Mutex;
use proptest::prelude::*;

use crate::integration::support::{
    body, dhf_gateway, fast_options, gateway_for_shape, read, runtime, shape_strategy, sorted,
    DESTINATION_ID, TEMPLATE_ID,
};

#[derive(Default)]
struct Recorder {
    completed: Mutex<Vec<usize>>,
}

impl ReplicationObserver for Recorder {
    fn on_step_completed(&self, index: usize, _step: &PlanStep, _outcome: &StepOutcome) {
        self.completed.lock().push(index);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn waves_report_outcomes_in_plan_order() {
    let gateway = dhf_gateway();
    let tree = read(&gateway, TEMPLATE_ID).await;
    let plan = TreePlanner::plan(&tree, "Acme");
    let recorder = Arc::new(Recorder::default());

    let result = ReplicationExecutor::new(gateway.clone(), fast_options(4))
        .with_observer(recorder.clone())
        .execute(&plan, DESTINATION_ID)
        .await
        .unwrap();

    assert!(result.is_clean());
    let completed = recorder.completed.lock().clone();
    assert_eq!(completed, (0..plan.len()).collect::<Vec<_>>());
    assert_eq!(
        sorted(body(gateway.outline(&result.root_destination_id))),
        sorted(body(gateway.outline(TEMPLATE_ID)))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn waves_skip_descendants_of_failed_folders() {
    let gateway = dhf_gateway();
    gateway.fail_always(
        GatewayOp::CreateFolder,
        "01 Plans",
        GatewayError::NotFound("parent vanished".to_string()),
    );
    let tree = read(&gateway, TEMPLATE_ID).await;
    let result = ReplicationExecutor::new(gateway.clone(), fast_options(8))
        .execute(&TreePlanner::plan(&tree, "Acme"), DESTINATION_ID)
        .await
        .unwrap();

    assert_eq!(result.state, ExecutorState::CompletedWithFailures);
    assert_eq!(result.failures.len(), 3);
    for skipped in ["qp", "rmp"] {
        assert_eq!(
            result.failure_for(skipped).unwrap().reason,
            FailureReason::ParentUnavailable
        );
    }
    assert_eq!(gateway.calls().iter().filter(|c| c.op == GatewayOp::CopyFile).count(), 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn concurrent_and_sequential_runs_agree(shape in shape_strategy(30), width in 2usize..6) {
        let rt = runtime();

        let sequential = gateway_for_shape(&shape);
        let tree = rt.block_on(read(&sequential, TEMPLATE_ID));
        let plan = TreePlanner::plan(&tree, "Client");
        let seq = rt
            .block_on(async {
                ReplicationExecutor::new(sequential.clone(), fast_options(1))
                    .execute(&plan, DESTINATION_ID)
                    .await
            })
            .unwrap();

        let concurrent = gateway_for_shape(&shape);
        let con = rt
            .block_on(async {
                ReplicationExecutor::new(concurrent.clone(), fast_options(width))
                    .execute(&plan, DESTINATION_ID)
                    .await
            })
            .unwrap();

        prop_assert_eq!(seq.created_folders, con.created_folders);
        prop_assert_eq!(seq.copied_files, con.copied_files);
        prop_assert_eq!(
            sorted(sequential.outline(&seq.root_destination_id)),
            sorted(concurrent.outline(&con.root_destination_id))
        );
    }
}
