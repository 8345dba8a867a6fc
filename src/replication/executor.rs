//! Replication Executor
//!
//! Runs a [`ReplicationPlan`] against a [`StorageGateway`]. The executor task is
//! the only writer of the id map and the counters; in concurrent mode gateway
//! calls of one wave run together but their outcomes are applied in plan order.

use crate::config::ReplicationConfig;
use crate::error::{ApiError, GatewayError};
use crate::gateway::StorageGateway;
use crate::plan::{PlanStep, ReplicationPlan};
use crate::replication::id_map::IdMap;
use crate::replication::observer::{CancellationFlag, NoopObserver, ReplicationObserver};
use crate::replication::report::{
    ExecutorState, FailureReason, NodeFailure, ReplicationResult, StepOutcome,
};
use crate::replication::retry::RetryPolicy;
use crate::tree::NodeKind;
use crate::types::NodeId;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Execution tuning
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub retry: RetryPolicy,
    /// Gateway calls in flight at once; 1 runs strictly sequentially
    pub concurrency: usize,
    /// Minimum gap between mutating calls in sequential mode
    pub pacing: Duration,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            concurrency: 1,
            pacing: Duration::from_millis(100),
        }
    }
}

impl From<&ReplicationConfig> for ExecutorOptions {
    fn from(config: &ReplicationConfig) -> Self {
        Self {
            retry: RetryPolicy::from(&config.retry),
            concurrency: config.concurrency.max(1),
            pacing: Duration::from_millis(config.pacing_ms),
        }
    }
}

/// Accumulators owned by the executor task for one run
#[derive(Default)]
struct RunLedger {
    id_map: IdMap,
    created_folders: usize,
    copied_files: usize,
    failures: Vec<NodeFailure>,
    cancelled: bool,
}

impl RunLedger {
    fn record(&mut self, step: &PlanStep, outcome: &StepOutcome) {
        match outcome {
            StepOutcome::Created { destination_id, .. } => {
                if self
                    .id_map
                    .insert(step.source_id.clone(), destination_id.clone())
                {
                    match step.kind {
                        NodeKind::Folder => self.created_folders += 1,
                        NodeKind::File => self.copied_files += 1,
                    }
                }
            }
            StepOutcome::Failed { reason, attempts } => {
                warn!(
                    source_id = %step.source_id,
                    name = %step.name,
                    kind = step.kind.as_str(),
                    attempts,
                    reason = %reason,
                    "Node not replicated"
                );
                self.failures.push(NodeFailure {
                    source_id: step.source_id.clone(),
                    name: step.name.clone(),
                    kind: step.kind,
                    reason: reason.clone(),
                    attempts: *attempts,
                });
            }
        }
    }

    /// Destination parent for a non-root step, if it was created.
    fn parent_of(&self, step: &PlanStep) -> Option<NodeId> {
        step.source_parent_id
            .as_deref()
            .and_then(|p| self.id_map.get(p))
            .cloned()
    }
}

pub struct ReplicationExecutor {
    gateway: Arc<dyn StorageGateway>,
    options: ExecutorOptions,
    observer: Arc<dyn ReplicationObserver>,
    cancellation: CancellationFlag,
    state: ExecutorState,
}

impl ReplicationExecutor {
    /// Idle executor with no observer and a fresh cancellation flag
    pub fn new(gateway: Arc<dyn StorageGateway>, options: ExecutorOptions) -> Self {
        Self {
            gateway,
            options,
            observer: Arc::new(NoopObserver),
            cancellation: CancellationFlag::new(),
            state: ExecutorState::Idle,
        }
    }

    /// Report progress to `observer`
    pub fn with_observer(mut self, observer: Arc<dyn ReplicationObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Share an externally owned cancellation flag
    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> ExecutorState {
        self.state
    }

    /// Flag checked before each step (or wave, when concurrent)
    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancellation
    }

    /// Replicate `plan` under `destination_parent_id`.
    ///
    /// Per-node failures are recorded in the result. Only a rejected plan, a
    /// cancellation before the first call, or a failed root folder are errors.
    pub async fn execute(
        &mut self,
        plan: &ReplicationPlan,
        destination_parent_id: &str,
    ) -> Result<ReplicationResult, ApiError> {
        if let Err(err) = plan.validate() {
            self.state = ExecutorState::Failed;
            return Err(err);
        }
        if self.cancellation.is_cancelled() {
            self.state = ExecutorState::Cancelled;
            return Err(ApiError::Cancelled);
        }

        self.state = ExecutorState::Running;
        let started = Instant::now();
        match self.run(plan, destination_parent_id).await {
            Ok((root_destination_id, ledger)) => {
                self.state = if ledger.cancelled {
                    ExecutorState::Cancelled
                } else if ledger.failures.is_empty() {
                    ExecutorState::Completed
                } else {
                    ExecutorState::CompletedWithFailures
                };
                let result = ReplicationResult {
                    root_destination_id,
                    root_name: plan.root().map(|s| s.name.clone()).unwrap_or_default(),
                    created_folders: ledger.created_folders,
                    copied_files: ledger.copied_files,
                    failures: ledger.failures,
                    cancelled: ledger.cancelled,
                    state: self.state,
                    total_steps: plan.len(),
                    duration_ms: started.elapsed().as_millis() as u64,
                };
                info!(
                    root_destination_id = %result.root_destination_id,
                    created_folders = result.created_folders,
                    copied_files = result.copied_files,
                    failures = result.failures.len(),
                    cancelled = result.cancelled,
                    duration_ms = result.duration_ms,
                    "Replication finished"
                );
                Ok(result)
            }
            Err(err) => {
                self.state = ExecutorState::Failed;
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        plan: &ReplicationPlan,
        destination_parent_id: &str,
    ) -> Result<(NodeId, RunLedger), ApiError> {
        let steps = plan.steps();
        let mut ledger = RunLedger::default();
        self.observer.on_run_started(steps.len());

        let root = &steps[0];
        self.observer.on_step_started(0, root);
        let outcome = self.attempt(root, destination_parent_id).await;
        self.observer.on_step_completed(0, root, &outcome);
        let root_destination_id = match outcome {
            StepOutcome::Created { destination_id, .. } => destination_id,
            StepOutcome::Failed { reason, .. } => {
                let source = match reason {
                    FailureReason::Gateway(err) => err,
                    FailureReason::ParentUnavailable => {
                        GatewayError::NotFound(destination_parent_id.to_string())
                    }
                };
                return Err(ApiError::RootCreation {
                    name: root.name.clone(),
                    source,
                });
            }
        };
        ledger.record(
            root,
            &StepOutcome::Created {
                destination_id: root_destination_id.clone(),
                attempts: 0,
            },
        );
        info!(
            root_name = %root.name,
            root_destination_id = %root_destination_id,
            steps = steps.len(),
            concurrency = self.options.concurrency,
            "Workspace root created"
        );

        if self.options.concurrency > 1 {
            self.run_waves(steps, &mut ledger).await;
        } else {
            self.run_sequential(steps, &mut ledger).await;
        }
        Ok((root_destination_id, ledger))
    }

    async fn run_sequential(&self, steps: &[PlanStep], ledger: &mut RunLedger) {
        let mut last_mutation = Some(Instant::now());
        for (index, step) in steps.iter().enumerate().skip(1) {
            if self.cancellation.is_cancelled() {
                info!(completed_steps = index, "Replication cancelled");
                ledger.cancelled = true;
                break;
            }

            let outcome = match ledger.parent_of(step) {
                Some(parent) => {
                    if let Some(last) = last_mutation {
                        let elapsed = last.elapsed();
                        if elapsed < self.options.pacing {
                            sleep(self.options.pacing - elapsed).await;
                        }
                    }
                    self.observer.on_step_started(index, step);
                    let outcome = self.attempt(step, &parent).await;
                    last_mutation = Some(Instant::now());
                    outcome
                }
                None => StepOutcome::Failed {
                    reason: FailureReason::ParentUnavailable,
                    attempts: 0,
                },
            };
            ledger.record(step, &outcome);
            self.observer.on_step_completed(index, step, &outcome);
        }
    }

    async fn run_waves(&self, steps: &[PlanStep], ledger: &mut RunLedger) {
        let mut index = 1;
        let mut waves = 0usize;
        while index < steps.len() {
            if self.cancellation.is_cancelled() {
                info!(completed_steps = index, waves, "Replication cancelled");
                ledger.cancelled = true;
                break;
            }

            // Extend the wave until a step depends on a folder created within it.
            let mut wave_folders: HashSet<&str> = HashSet::new();
            let mut end = index;
            while end < steps.len() {
                let step = &steps[end];
                if step
                    .source_parent_id
                    .as_deref()
                    .is_some_and(|p| wave_folders.contains(p))
                {
                    break;
                }
                if step.kind == NodeKind::Folder {
                    wave_folders.insert(step.source_id.as_str());
                }
                end += 1;
            }

            let mut outcomes: Vec<(usize, StepOutcome)> = Vec::with_capacity(end - index);
            let mut dispatch: Vec<(usize, NodeId)> = Vec::new();
            for (offset, step) in steps[index..end].iter().enumerate() {
                match ledger.parent_of(step) {
                    Some(parent) => dispatch.push((index + offset, parent)),
                    None => outcomes.push((
                        index + offset,
                        StepOutcome::Failed {
                            reason: FailureReason::ParentUnavailable,
                            attempts: 0,
                        },
                    )),
                }
            }
            debug!(
                wave = waves,
                first_step = index,
                steps = end - index,
                dispatched = dispatch.len(),
                "Dispatching wave"
            );

            let completed: Vec<(usize, StepOutcome)> = stream::iter(dispatch)
                .map(|(position, parent)| async move {
                    let step = &steps[position];
                    self.observer.on_step_started(position, step);
                    (position, self.attempt(step, &parent).await)
                })
                .buffer_unordered(self.options.concurrency)
                .collect()
                .await;
            outcomes.extend(completed);
            outcomes.sort_by_key(|(position, _)| *position);

            for (position, outcome) in outcomes {
                let step = &steps[position];
                ledger.record(step, &outcome);
                self.observer.on_step_completed(position, step, &outcome);
            }
            index = end;
            waves += 1;
        }
    }

    /// Issue the gateway call for one step under the retry policy.
    async fn attempt(&self, step: &PlanStep, parent: &str) -> StepOutcome {
        let on_retry = |attempt: u32, err: &GatewayError, delay: Duration| {
            warn!(
                source_id = %step.source_id,
                name = %step.name,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying gateway call"
            );
            self.observer.on_retry(step, attempt, err, delay);
        };

        let (result, attempts) = match step.kind {
            NodeKind::Folder => {
                self.options
                    .retry
                    .run(|| self.gateway.create_folder(&step.name, parent), on_retry)
                    .await
            }
            NodeKind::File => {
                self.options
                    .retry
                    .run(
                        || self.gateway.copy_file(&step.source_id, &step.name, parent),
                        on_retry,
                    )
                    .await
            }
        };

        match result {
            Ok(destination_id) => {
                debug!(
                    source_id = %step.source_id,
                    destination_id = %destination_id,
                    kind = step.kind.as_str(),
                    attempts,
                    "Step replicated"
                );
                StepOutcome::Created {
                    destination_id,
                    attempts,
                }
            }
            Err(err) => StepOutcome::Failed {
                reason: FailureReason::Gateway(err),
                attempts,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayOp, InMemoryGateway};
    use crate::plan::TreePlanner;
    use crate::tree::{Node, SourceTreeBuilder};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_options() -> ExecutorOptions {
        ExecutorOptions {
            retry: RetryPolicy::immediate(5),
            concurrency: 1,
            pacing: Duration::ZERO,
        }
    }

    /// Template: root → [Folder A → [x.doc], File y.doc]; destination "dest".
    fn scenario() -> (Arc<InMemoryGateway>, ReplicationPlan) {
        let gateway = InMemoryGateway::new();
        gateway.add_folder("root", "Template", None);
        gateway.add_folder("a", "A", Some("root"));
        gateway.add_file("x", "x.doc", "a");
        gateway.add_file("y", "y.doc", "root");
        gateway.add_folder("dest", "Clients", None);

        let mut builder = SourceTreeBuilder::new(Node::folder("root", "Template", None)).unwrap();
        builder
            .add_children(
                "root",
                vec![Node::folder("a", "A", None), Node::file("y", "y.doc", None)],
            )
            .unwrap();
        builder
            .add_children("a", vec![Node::file("x", "x.doc", None)])
            .unwrap();
        let plan = TreePlanner::plan(&builder.build(), "Acme Corp");
        (Arc::new(gateway), plan)
    }

    #[tokio::test]
    async fn test_full_success() {
        let (gateway, plan) = scenario();
        let mut executor = ReplicationExecutor::new(gateway.clone(), fast_options());
        assert_eq!(executor.state(), ExecutorState::Idle);

        let result = executor.execute(&plan, "dest").await.unwrap();
        assert_eq!(result.created_folders, 2);
        assert_eq!(result.copied_files, 2);
        assert!(result.failures.is_empty());
        assert!(result.is_clean());
        assert_eq!(executor.state(), ExecutorState::Completed);

        let outline = gateway.outline(&result.root_destination_id);
        let names: Vec<&str> = outline.iter().map(|(_, n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Acme Corp", "A", "x.doc", "y.doc"]);
    }

    #[tokio::test]
    async fn test_failed_folder_skips_descendants() {
        let (gateway, plan) = scenario();
        gateway.fail_always(
            GatewayOp::CreateFolder,
            "A",
            GatewayError::PermissionDenied("denied".to_string()),
        );
        let mut executor = ReplicationExecutor::new(gateway.clone(), fast_options());
        let result = executor.execute(&plan, "dest").await.unwrap();

        assert_eq!(result.created_folders, 1);
        assert_eq!(result.copied_files, 1);
        assert_eq!(result.failures.len(), 2);
        assert_eq!(result.failures[0].name, "A");
        assert_eq!(result.failures[0].attempts, 1);
        assert_eq!(result.failures[1].reason, FailureReason::ParentUnavailable);
        assert_eq!(result.failures[1].attempts, 0);
        assert_eq!(gateway.call_count(GatewayOp::CopyFile, "x.doc"), 0);
        assert_eq!(gateway.call_count(GatewayOp::CreateFolder, "A"), 1);
        assert_eq!(executor.state(), ExecutorState::CompletedWithFailures);
    }

    #[tokio::test]
    async fn test_rate_limited_copy_recovers() {
        let (gateway, plan) = scenario();
        gateway.fail_times(
            GatewayOp::CopyFile,
            "y.doc",
            GatewayError::rate_limited("userRateLimitExceeded"),
            2,
        );
        let mut executor = ReplicationExecutor::new(gateway.clone(), fast_options());
        let result = executor.execute(&plan, "dest").await.unwrap();

        assert_eq!(result.copied_files, 2);
        assert!(result.failures.is_empty());
        assert_eq!(gateway.call_count(GatewayOp::CopyFile, "y.doc"), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_records_attempts() {
        let (gateway, plan) = scenario();
        gateway.fail_always(
            GatewayOp::CopyFile,
            "y.doc",
            GatewayError::Transient("connection reset".to_string()),
        );
        let options = ExecutorOptions {
            retry: RetryPolicy::immediate(3),
            ..fast_options()
        };
        let mut executor = ReplicationExecutor::new(gateway.clone(), options);
        let result = executor.execute(&plan, "dest").await.unwrap();

        let failure = result.failure_for("y").unwrap();
        assert_eq!(failure.attempts, 3);
        assert!(matches!(
            failure.reason,
            FailureReason::Gateway(GatewayError::Transient(_))
        ));
        assert_eq!(result.copied_files, 1);
    }

    #[tokio::test]
    async fn test_root_failure_is_fatal() {
        let (gateway, plan) = scenario();
        gateway.fail_always(
            GatewayOp::CreateFolder,
            "Acme Corp",
            GatewayError::PermissionDenied("read-only".to_string()),
        );
        let mut executor = ReplicationExecutor::new(gateway.clone(), fast_options());
        let err = executor.execute(&plan, "dest").await.unwrap_err();

        assert!(matches!(err, ApiError::RootCreation { ref name, .. } if name == "Acme Corp"));
        assert_eq!(executor.state(), ExecutorState::Failed);
        // Only the root call was made.
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_destination_is_root_failure() {
        let (gateway, plan) = scenario();
        let mut executor = ReplicationExecutor::new(gateway, fast_options());
        let err = executor.execute(&plan, "nowhere").await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::RootCreation {
                source: GatewayError::NotFound(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (gateway, plan) = scenario();
        let flag = CancellationFlag::new();
        flag.cancel();
        let mut executor =
            ReplicationExecutor::new(gateway.clone(), fast_options()).with_cancellation(flag);
        assert!(matches!(
            executor.execute(&plan, "dest").await,
            Err(ApiError::Cancelled)
        ));
        assert!(gateway.calls().is_empty());
    }

    struct CancelAfter {
        flag: CancellationFlag,
        after: usize,
        seen: AtomicUsize,
    }

    impl ReplicationObserver for CancelAfter {
        fn on_step_completed(&self, _index: usize, _step: &PlanStep, _outcome: &StepOutcome) {
            if self.seen.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
                self.flag.cancel();
            }
        }
    }

    #[tokio::test]
    async fn test_cancelled_between_steps() {
        let (gateway, plan) = scenario();
        let flag = CancellationFlag::new();
        let observer = Arc::new(CancelAfter {
            flag: flag.clone(),
            after: 2,
            seen: AtomicUsize::new(0),
        });
        let mut executor = ReplicationExecutor::new(gateway.clone(), fast_options())
            .with_observer(observer)
            .with_cancellation(flag);
        let result = executor.execute(&plan, "dest").await.unwrap();

        assert!(result.cancelled);
        assert_eq!(result.state, ExecutorState::Cancelled);
        assert_eq!(result.created_folders, 2);
        assert_eq!(result.copied_files, 0);
        assert_eq!(result.unattempted_steps(), 2);
        // Already created folders stay in place.
        assert_eq!(gateway.children_of("dest").len(), 1);
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ReplicationObserver for Recorder {
        fn on_step_completed(&self, index: usize, step: &PlanStep, outcome: &StepOutcome) {
            self.events.lock().push(format!(
                "{}:{}:{}",
                index,
                step.name,
                outcome.is_created()
            ));
        }

        fn on_retry(&self, step: &PlanStep, attempt: u32, _error: &GatewayError, _delay: Duration) {
            self.events.lock().push(format!("retry:{}:{}", step.name, attempt));
        }
    }

    #[tokio::test]
    async fn test_observer_sees_plan_order() {
        let (gateway, plan) = scenario();
        gateway.fail_times(
            GatewayOp::CreateFolder,
            "A",
            GatewayError::Transient("timeout".to_string()),
            1,
        );
        let recorder = Arc::new(Recorder::default());
        let mut executor =
            ReplicationExecutor::new(gateway, fast_options()).with_observer(recorder.clone());
        executor.execute(&plan, "dest").await.unwrap();

        assert_eq!(
            *recorder.events.lock(),
            vec![
                "0:Acme Corp:true",
                "retry:A:1",
                "1:A:true",
                "2:x.doc:true",
                "3:y.doc:true"
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_waves_match_sequential() {
        let (gateway, plan) = scenario();
        let options = ExecutorOptions {
            concurrency: 4,
            ..fast_options()
        };
        let recorder = Arc::new(Recorder::default());
        let mut executor =
            ReplicationExecutor::new(gateway.clone(), options).with_observer(recorder.clone());
        let result = executor.execute(&plan, "dest").await.unwrap();

        assert_eq!(result.created_folders, 2);
        assert_eq!(result.copied_files, 2);
        let outline = gateway.outline(&result.root_destination_id);
        let names: Vec<&str> = outline.iter().map(|(_, n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Acme Corp", "A", "x.doc", "y.doc"]);
        // Outcomes are still reported in plan order.
        let order: Vec<String> = recorder.events.lock().clone();
        assert_eq!(order[1], "1:A:true");
        assert_eq!(order[2], "2:x.doc:true");
    }

    #[tokio::test]
    async fn test_concurrent_failure_skips_descendants() {
        let (gateway, plan) = scenario();
        gateway.fail_always(
            GatewayOp::CreateFolder,
            "A",
            GatewayError::NotFound("gone".to_string()),
        );
        let options = ExecutorOptions {
            concurrency: 3,
            ..fast_options()
        };
        let mut executor = ReplicationExecutor::new(gateway.clone(), options);
        let result = executor.execute(&plan, "dest").await.unwrap();
        assert_eq!(result.created_folders, 1);
        assert_eq!(result.copied_files, 1);
        assert_eq!(gateway.call_count(GatewayOp::CopyFile, "x.doc"), 0);
    }

    #[tokio::test]
    async fn test_invalid_plan_rejected() {
        let (gateway, _) = scenario();
        let plan = ReplicationPlan::from_steps(Vec::new());
        let mut executor = ReplicationExecutor::new(gateway.clone(), fast_options());
        assert!(matches!(
            executor.execute(&plan, "dest").await,
            Err(ApiError::InvalidPlan(_))
        ));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_spaces_mutations() {
        let (gateway, plan) = scenario();
        let options = ExecutorOptions {
            pacing: Duration::from_millis(100),
            ..fast_options()
        };
        let started = Instant::now();
        let mut executor = ReplicationExecutor::new(gateway, options);
        executor.execute(&plan, "dest").await.unwrap();
        // Three paced mutations after the root.
        assert!(started.elapsed() >= Duration::from_millis(300));
    }
}
