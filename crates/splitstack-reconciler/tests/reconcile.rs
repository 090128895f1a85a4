//! Reconciler integration tests against an in-memory control plane.
//!
//! The fake control plane models environments as a queue of statuses to
//! report before settling, so every wait goes through real polling with
//! tokio's paused clock.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use splitstack_core::{
    naming, Error, ForwardingRule, HealthCheck, LoadBalancer, LoadBalancerConfig,
    StackParameters, Target, TargetPool, WeightedPool, LISTENER_PORT, SERVICE_PORT,
};
use splitstack_planner::Template;
use splitstack_reconciler::{
    wait_until_terminal, ApplyPath, ControlPlane, ControlPlaneFuture, CreateOutcome,
    EnvironmentDescription, OperationKind, PollConfig, PollPolicy, Reconciler, StackStatus,
    UpdateOutcome,
};

#[derive(Debug)]
struct FakeEnvironment {
    id: String,
    body: String,
    pending: VecDeque<StackStatus>,
    settled: Option<StackStatus>,
    reason: Option<String>,
}

#[derive(Default)]
struct FakeState {
    environments: HashMap<String, FakeEnvironment>,
    calls: Vec<String>,
    waits: Vec<(OperationKind, PollConfig)>,
    next_id: u32,
    update_bodies: Vec<String>,
    fail_next_update: Option<String>,
}

#[derive(Default)]
struct FakeControlPlane {
    state: Mutex<FakeState>,
}

impl FakeControlPlane {
    fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn waits(&self) -> Vec<(OperationKind, PollConfig)> {
        self.state.lock().unwrap().waits.clone()
    }

    fn update_bodies(&self) -> Vec<String> {
        self.state.lock().unwrap().update_bodies.clone()
    }

    fn exists(&self, env: &str) -> bool {
        self.state.lock().unwrap().environments.contains_key(env)
    }

    fn fail_next_update(&self, reason: &str) {
        self.state.lock().unwrap().fail_next_update = Some(reason.to_string());
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

impl ControlPlane for FakeControlPlane {
    fn create<'a>(
        &'a self,
        env: &'a str,
        template: &'a Template,
        _parameters: &'a StackParameters,
    ) -> ControlPlaneFuture<'a, CreateOutcome> {
        Box::pin(async move {
            self.record(format!("create:{env}"));
            let mut state = self.state.lock().unwrap();
            if state.environments.contains_key(env) {
                return Ok(CreateOutcome::AlreadyExists);
            }
            state.next_id += 1;
            let id = format!("stack/{env}/{}", state.next_id);
            state.environments.insert(
                env.to_string(),
                FakeEnvironment {
                    id: id.clone(),
                    body: template.body().to_string(),
                    pending: VecDeque::from([
                        StackStatus::CreateInProgress,
                        StackStatus::CreateInProgress,
                    ]),
                    settled: Some(StackStatus::CreateComplete),
                    reason: None,
                },
            );
            Ok(CreateOutcome::Created { environment_id: id })
        })
    }

    fn update<'a>(
        &'a self,
        env: &'a str,
        template: &'a Template,
        _parameters: &'a StackParameters,
    ) -> ControlPlaneFuture<'a, UpdateOutcome> {
        Box::pin(async move {
            self.record(format!("update:{env}"));
            let mut state = self.state.lock().unwrap();
            state.update_bodies.push(template.body().to_string());
            let failure = state.fail_next_update.take();
            let Some(environment) = state.environments.get_mut(env) else {
                return Err(Error::NotFound(env.to_string()));
            };
            if failure.is_none() && environment.body == template.body() {
                return Ok(UpdateOutcome::Unchanged);
            }
            environment.body = template.body().to_string();
            environment.pending = VecDeque::from([StackStatus::UpdateInProgress]);
            match failure {
                Some(reason) => {
                    environment
                        .pending
                        .push_back(StackStatus::UpdateRollbackInProgress);
                    environment.settled = Some(StackStatus::UpdateRollbackComplete);
                    environment.reason = Some(reason);
                }
                None => environment.settled = Some(StackStatus::UpdateComplete),
            }
            Ok(UpdateOutcome::Submitted)
        })
    }

    fn delete<'a>(&'a self, env: &'a str) -> ControlPlaneFuture<'a, ()> {
        Box::pin(async move {
            self.record(format!("delete:{env}"));
            let mut state = self.state.lock().unwrap();
            let Some(environment) = state.environments.get_mut(env) else {
                return Err(Error::NotFound(env.to_string()));
            };
            environment.pending = VecDeque::from([StackStatus::DeleteInProgress]);
            environment.settled = None;
            Ok(())
        })
    }

    fn describe<'a>(
        &'a self,
        env: &'a str,
    ) -> ControlPlaneFuture<'a, Option<EnvironmentDescription>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            let observed = state.environments.get_mut(env).and_then(|environment| {
                let status = environment.pending.pop_front().or(environment.settled)?;
                Some(EnvironmentDescription {
                    environment_id: environment.id.clone(),
                    status,
                    reason: environment.reason.clone(),
                })
            });
            if observed.is_none() {
                // Deletion settled.
                state.environments.remove(env);
            }
            Ok(observed)
        })
    }

    fn describe_resource<'a>(
        &'a self,
        env: &'a str,
        logical_id: &'a str,
    ) -> ControlPlaneFuture<'a, String> {
        Box::pin(async move {
            self.record(format!("describe_resource:{env}:{logical_id}"));
            Ok(format!("arn:lb/{logical_id}"))
        })
    }

    fn load_balancer_address<'a>(&'a self, physical_id: &'a str) -> ControlPlaneFuture<'a, String> {
        Box::pin(async move {
            let name = physical_id.trim_start_matches("arn:lb/");
            Ok(format!("{name}-123.us-west-2.elb.amazonaws.com"))
        })
    }

    fn wait_until_terminal<'a>(
        &'a self,
        env: &'a str,
        operation: OperationKind,
        poll: PollConfig,
    ) -> ControlPlaneFuture<'a, Option<EnvironmentDescription>> {
        self.state.lock().unwrap().waits.push((operation, poll));
        Box::pin(wait_until_terminal(self, env, operation, poll))
    }
}

fn graph(stack: &str, instances: &[&str]) -> LoadBalancerConfig {
    let lb = naming::load_balancer_id(stack);
    let pool_id = naming::target_pool_id(stack, "v1");
    LoadBalancerConfig {
        stack_id: stack.to_string(),
        parameters: StackParameters {
            security_groups: vec!["sg-1".to_string()],
            subnets: vec!["subnet-a".to_string()],
            vpc_id: "vpc-1".to_string(),
        },
        load_balancer: LoadBalancer {
            logical_id: lb.clone(),
            name: naming::load_balancer_name(stack),
        },
        forwarding_rule: ForwardingRule {
            logical_id: naming::listener_id(stack),
            load_balancer_ref: lb,
            port: LISTENER_PORT,
            pools: vec![WeightedPool {
                pool_ref: pool_id.clone(),
                weight: 100,
            }],
        },
        target_pools: vec![TargetPool {
            logical_id: pool_id,
            name: naming::target_pool_name(stack, "v1"),
            version_label: "v1".to_string(),
            port: SERVICE_PORT,
            health_check: HealthCheck::default(),
            targets: instances
                .iter()
                .map(|id| Target {
                    instance_id: id.to_string(),
                    port: SERVICE_PORT,
                })
                .collect(),
        }],
    }
}

fn policy() -> PollPolicy {
    PollPolicy {
        create: PollConfig::from_secs(1, 1, 10),
        update: PollConfig::from_secs(10, 1, 10),
        delete: PollConfig::from_secs(1, 1, 10),
    }
}

#[tokio::test(start_paused = true)]
async fn apply_on_absent_stack_creates() {
    let cp = FakeControlPlane::default();
    let reconciler = Reconciler::new(&cp, policy());

    let deployment = reconciler.apply(&graph("prod", &["i-aaa"])).await.unwrap();

    assert_eq!(deployment.path, ApplyPath::Created);
    assert_eq!(deployment.address, "ALBprod-123.us-west-2.elb.amazonaws.com");
    assert_eq!(deployment.environment_id, "stack/prod/1");
    let calls = cp.calls();
    assert_eq!(calls[0], "create:prod");
    assert!(!calls.iter().any(|c| c.starts_with("update")));
    assert!(calls.contains(&"describe_resource:prod:ALBprod".to_string()));
    assert_eq!(cp.waits(), vec![(OperationKind::Create, policy().create)]);
}

#[tokio::test(start_paused = true)]
async fn apply_on_existing_stack_updates_with_update_cadence() {
    let cp = FakeControlPlane::default();
    let reconciler = Reconciler::new(&cp, policy());
    reconciler.apply(&graph("prod", &["i-aaa"])).await.unwrap();

    let scaled = graph("prod", &["i-aaa", "i-bbb"]);
    let started = tokio::time::Instant::now();
    let deployment = reconciler.apply(&scaled).await.unwrap();

    assert_eq!(deployment.path, ApplyPath::Updated);
    assert_eq!(deployment.address, "ALBprod-123.us-west-2.elb.amazonaws.com");
    assert!(started.elapsed() >= Duration::from_secs(10));

    let calls = cp.calls();
    let creates = calls.iter().filter(|c| *c == "create:prod").count();
    let updates = calls.iter().filter(|c| *c == "update:prod").count();
    assert_eq!(creates, 2);
    assert_eq!(updates, 1);
    assert_eq!(
        cp.update_bodies(),
        vec![Template::render(&scaled).unwrap().body().to_string()]
    );
    assert_eq!(cp.waits().last(), Some(&(OperationKind::Update, policy().update)));
}

#[tokio::test(start_paused = true)]
async fn apply_with_unchanged_template_skips_wait() {
    let cp = FakeControlPlane::default();
    let reconciler = Reconciler::new(&cp, policy());
    reconciler.apply(&graph("prod", &["i-aaa"])).await.unwrap();

    let deployment = reconciler.apply(&graph("prod", &["i-aaa"])).await.unwrap();
    assert_eq!(deployment.path, ApplyPath::Unchanged);
    assert_eq!(cp.waits().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_update_surfaces_remote_status() {
    let cp = FakeControlPlane::default();
    let reconciler = Reconciler::new(&cp, policy());
    reconciler.apply(&graph("prod", &["i-aaa"])).await.unwrap();

    cp.fail_next_update("Target group tg-v1-prod is in use");
    let err = reconciler
        .apply(&graph("prod", &["i-bbb"]))
        .await
        .unwrap_err();

    match err {
        Error::DeploymentFailed {
            environment,
            status,
            reason,
        } => {
            assert_eq!(environment, "prod");
            assert_eq!(status, "UPDATE_ROLLBACK_COMPLETE");
            assert!(reason.contains("in use"));
        }
        other => panic!("expected DeploymentFailed, got {other:?}"),
    }
    let resolved = cp
        .calls()
        .iter()
        .filter(|c| c.starts_with("describe_resource:"))
        .count();
    assert_eq!(resolved, 1, "address must not be resolved after a failed update");
}

#[tokio::test(start_paused = true)]
async fn delete_waits_until_absent() {
    let cp = FakeControlPlane::default();
    let reconciler = Reconciler::new(&cp, policy());
    reconciler.apply(&graph("prod", &["i-aaa"])).await.unwrap();

    reconciler.delete("prod").await.unwrap();

    assert!(!cp.exists("prod"));
    assert_eq!(cp.waits().last(), Some(&(OperationKind::Delete, policy().delete)));
}

#[tokio::test(start_paused = true)]
async fn delete_of_missing_stack_is_not_found() {
    let cp = FakeControlPlane::default();
    let reconciler = Reconciler::new(&cp, policy());

    let err = reconciler.delete("ghost").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(ref env) if env == "ghost"));
    assert!(cp.waits().is_empty());
}

#[tokio::test(start_paused = true)]
async fn delete_then_apply_is_a_fresh_create() {
    let cp = FakeControlPlane::default();
    let reconciler = Reconciler::new(&cp, policy());
    reconciler.apply(&graph("prod", &["i-aaa"])).await.unwrap();
    reconciler.delete("prod").await.unwrap();

    let deployment = reconciler.apply(&graph("prod", &["i-aaa"])).await.unwrap();
    assert_eq!(deployment.path, ApplyPath::Created);
    assert_eq!(deployment.environment_id, "stack/prod/2");
    assert!(!cp.calls().iter().any(|c| c.starts_with("update")));
}

#[tokio::test(start_paused = true)]
async fn wait_gives_up_after_max_attempts() {
    let cp = FakeControlPlane::default();
    let template = Template::render(&graph("slow", &[])).unwrap();
    cp.create("slow", &template, &StackParameters::default())
        .await
        .unwrap();

    let poll = PollConfig::from_secs(0, 1, 2);
    let err = wait_until_terminal(&cp, "slow", OperationKind::Create, poll)
        .await
        .unwrap_err();
    match err {
        Error::DeploymentFailed { status, reason, .. } => {
            assert_eq!(status, "CREATE_IN_PROGRESS");
            assert!(reason.contains("2 polls"));
        }
        other => panic!("expected DeploymentFailed, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn wait_on_vanished_stack_fails_for_create() {
    let cp = FakeControlPlane::default();
    let err = wait_until_terminal(&cp, "ghost", OperationKind::Create, policy().create)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DeploymentFailed { ref status, .. } if status == "ABSENT"));
}

#[tokio::test(start_paused = true)]
async fn reconciler_rejects_inconsistent_graph_before_remote_calls() {
    let cp = FakeControlPlane::default();
    let reconciler = Reconciler::new(&cp, policy());
    let mut broken = graph("prod", &["i-aaa"]);
    broken.target_pools.clear();

    let err = reconciler.apply(&broken).await.unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
    assert!(cp.calls().is_empty());
}
