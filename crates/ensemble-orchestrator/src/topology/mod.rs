use crate::orchestrator::{Orchestrator, TurnResult};
use async_trait::async_trait;
use ensemble_core::EnsembleResult;
use std::collections::HashSet;
use tracing::info;

/// Coordinator-mediated routing.
pub mod hub_spoke;
/// QA-gated rework loop with anti-loop protection.
pub mod iterative_feedback;
/// Bounded producer → review revision loops.
pub mod peer_review;
/// Fixed linear execution.
pub mod sequential;

/// Shared retry/skip/fail-fast knobs every topology carries.
#[derive(Debug, Clone)]
pub struct TopologyControls {
    /// Extra attempts granted to a failing role before giving up on it.
    pub max_retries_per_role: u32,
    /// Whether a failed role halts the whole run immediately.
    pub fail_fast: bool,
    /// Roles to bypass entirely (preconditions already satisfied).
    pub skipped_roles: HashSet<String>,
}

impl Default for TopologyControls {
    fn default() -> Self {
        Self {
            max_retries_per_role: 0,
            fail_fast: true,
            skipped_roles: HashSet::new(),
        }
    }
}

impl TopologyControls {
    /// Sets the per-role retry budget.
    pub fn with_retries(mut self, max_retries_per_role: u32) -> Self {
        self.max_retries_per_role = max_retries_per_role;
        self
    }

    /// Enables or disables fail-fast.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Marks a role as skipped.
    pub fn skip_role(mut self, role: impl Into<String>) -> Self {
        self.skipped_roles.insert(role.into());
        self
    }
}

/// A scheduling policy over the turn scheduler.
///
/// Implementations supply the role set they intend to exercise via
/// [`Topology::plan_roles`] and may override [`Topology::run`] for custom
/// looping; the retry/skip/fail-fast machinery is shared. The default `run`
/// (used as-is by the sequential policy) sends a kickoff to the first
/// runnable role, then runs each planned role in order, breaking the run as
/// soon as a role's final attempt warrants stopping.
#[async_trait]
pub trait Topology: Send {
    /// The underlying turn scheduler.
    fn orchestrator(&self) -> &Orchestrator;

    /// Mutable access to the turn scheduler.
    fn orchestrator_mut(&mut self) -> &mut Orchestrator;

    /// Shared scheduling controls.
    fn controls(&self) -> &TopologyControls;

    /// Role execution order for this topology run.
    fn plan_roles(&self) -> Vec<String>;

    /// True if `role` is configured to be bypassed.
    fn should_skip(&self, role: &str) -> bool {
        self.controls().skipped_roles.contains(role)
    }

    /// First non-skipped role, the receiver of the kickoff task.
    fn kickoff_receiver(&self, roles: &[String]) -> Option<String> {
        roles.iter().find(|role| !self.should_skip(role)).cloned()
    }

    /// True if the run should halt after this turn: either the turn signaled
    /// `stop`, or it failed under fail-fast.
    fn should_stop(&self, result: &TurnResult) -> bool {
        result.stop || (!result.success && self.controls().fail_fast)
    }

    /// Runs one role with retry handling, stopping the retry loop as soon as
    /// a turn succeeds or signals `stop`. Returns every attempt, not just
    /// the last.
    async fn run_role(&mut self, role: &str) -> EnsembleResult<Vec<TurnResult>> {
        let max_attempts = self.controls().max_retries_per_role + 1;
        let mut attempts = Vec::with_capacity(1);
        for attempt in 0..max_attempts {
            if attempt > 0 {
                info!(role, attempt, "retrying role");
            }
            let result = self.orchestrator_mut().run_turn(role).await?;
            let settled = result.success || result.stop;
            attempts.push(result);
            if settled {
                break;
            }
        }
        Ok(attempts)
    }

    /// Executes the topology with the shared retry/skip/fail-fast controls.
    async fn run(&mut self, kickoff_content: &str) -> EnsembleResult<Vec<TurnResult>> {
        let roles = self.plan_roles();
        let Some(receiver) = self.kickoff_receiver(&roles) else {
            return Ok(Vec::new());
        };
        self.orchestrator_mut().kickoff(&receiver, kickoff_content);

        let mut results = Vec::new();
        for role in &roles {
            if self.should_skip(role) {
                continue;
            }
            let attempts = self.run_role(role).await?;
            let stop = attempts.last().is_some_and(|r| self.should_stop(r));
            results.extend(attempts);
            if stop {
                break;
            }
        }
        Ok(results)
    }
}
