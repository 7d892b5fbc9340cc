use crate::orchestrator::{Orchestrator, TurnResult};
use crate::topology::{sequential::DEFAULT_SEQUENTIAL_ROLES, Topology, TopologyControls};
use async_trait::async_trait;
use ensemble_core::{AgentMessage, EnsembleResult, MessageType};
use serde_json::json;
use tracing::{debug, info};

/// Coordinator-mediated routing: a dedicated hub role decides, each cycle,
/// which spoke role runs next.
///
/// The coordinator's intent is observable only through its most recent TASK
/// message to a known spoke role — the topology reads the decision back from
/// the message log rather than from a return value. After each spoke turn a
/// STATUS message is echoed to the coordinator so its next decision sees the
/// outcome.
pub struct HubAndSpokeTopology {
    orchestrator: Orchestrator,
    controls: TopologyControls,
    coordinator_role: String,
    spoke_roles: Vec<String>,
    max_cycles: u32,
}

impl HubAndSpokeTopology {
    /// Creates a hub-and-spoke run with the default coordinator role and
    /// spoke order, bounded at 32 cycles.
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            controls: TopologyControls::default(),
            coordinator_role: "coordinator".to_string(),
            spoke_roles: DEFAULT_SEQUENTIAL_ROLES
                .iter()
                .map(ToString::to_string)
                .collect(),
            max_cycles: 32,
        }
    }

    /// Replaces the coordinator role name.
    pub fn with_coordinator_role(mut self, role: impl Into<String>) -> Self {
        self.coordinator_role = role.into();
        self
    }

    /// Replaces the spoke role set.
    pub fn with_spoke_roles(mut self, roles: Vec<String>) -> Self {
        self.spoke_roles = roles;
        self
    }

    /// Bounds the number of coordination cycles.
    pub fn with_max_cycles(mut self, max_cycles: u32) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Replaces the scheduling controls.
    pub fn with_controls(mut self, controls: TopologyControls) -> Self {
        self.controls = controls;
        self
    }

    /// Consumes the topology, returning the scheduler and its final state.
    pub fn into_orchestrator(self) -> Orchestrator {
        self.orchestrator
    }

    /// The spoke role named by the coordinator's most recent TASK message,
    /// if any. This is the documented implicit coupling between message
    /// routing and control flow.
    fn latest_coordinator_route(&self) -> Option<String> {
        self.orchestrator
            .state()
            .message_log()
            .messages()
            .iter()
            .rev()
            .find(|message| {
                message.sender == self.coordinator_role
                    && message.msg_type == MessageType::Task
                    && self.spoke_roles.contains(&message.receiver)
            })
            .map(|message| message.receiver.clone())
    }

    /// Closes the loop: reports the spoke turn outcome back to the
    /// coordinator.
    fn send_spoke_status(&mut self, role: &str, result: &TurnResult) {
        let message = AgentMessage::new(
            role,
            self.coordinator_role.clone(),
            format!(
                "Spoke turn finished: success={}, stop={}",
                result.success, result.stop
            ),
            MessageType::Status,
        )
        .with_metadata("role", json!(role))
        .with_metadata("success", json!(result.success))
        .with_metadata("stop", json!(result.stop))
        .with_metadata("error", json!(result.error));
        self.orchestrator.route_message(message);
    }
}

#[async_trait]
impl Topology for HubAndSpokeTopology {
    fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    fn orchestrator_mut(&mut self) -> &mut Orchestrator {
        &mut self.orchestrator
    }

    fn controls(&self) -> &TopologyControls {
        &self.controls
    }

    fn plan_roles(&self) -> Vec<String> {
        let mut roles = vec![self.coordinator_role.clone()];
        roles.extend(self.spoke_roles.iter().cloned());
        roles
    }

    async fn run(&mut self, kickoff_content: &str) -> EnsembleResult<Vec<TurnResult>> {
        if self.should_skip(&self.coordinator_role) {
            return Ok(Vec::new());
        }

        let coordinator = self.coordinator_role.clone();
        self.orchestrator.kickoff(&coordinator, kickoff_content);
        let mut results = Vec::new();

        for cycle in 0..self.max_cycles {
            let attempts = self.run_role(&coordinator).await?;
            let stop = attempts.last().is_some_and(|r| self.should_stop(r));
            results.extend(attempts);
            if stop {
                info!(cycle, "coordinator ended the run");
                break;
            }

            let Some(next_role) = self.latest_coordinator_route() else {
                info!(cycle, "no actionable route from coordinator");
                break;
            };
            if self.should_skip(&next_role) {
                debug!(cycle, role = %next_role, "routed spoke is skipped");
                continue;
            }

            let attempts = self.run_role(&next_role).await?;
            let spoke_result = attempts.last().cloned();
            results.extend(attempts);
            let Some(spoke_result) = spoke_result else {
                continue;
            };
            self.send_spoke_status(&next_role, &spoke_result);

            // One coordination cycle = one iteration.
            if spoke_result.success {
                self.orchestrator.state_mut().increment_iteration();
            }
            if self.should_stop(&spoke_result) {
                info!(cycle, role = %next_role, "spoke ended the run");
                break;
            }
        }

        Ok(results)
    }
}
