use crate::orchestrator::Orchestrator;
use crate::topology::{Topology, TopologyControls};
use async_trait::async_trait;

/// Default pipeline order: requirements → architecture → backend → frontend
/// → QA → deployment.
pub const DEFAULT_SEQUENTIAL_ROLES: [&str; 6] = [
    "pm",
    "architect",
    "backend_dev",
    "frontend_dev",
    "qa",
    "devops",
];

/// Strict linear execution: each role runs exactly once (plus retries),
/// fail-fast by default. Uses the shared [`Topology`] machinery unchanged.
pub struct SequentialTopology {
    orchestrator: Orchestrator,
    controls: TopologyControls,
    roles: Vec<String>,
}

impl SequentialTopology {
    /// Creates a sequential run over the default role order.
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            controls: TopologyControls::default(),
            roles: DEFAULT_SEQUENTIAL_ROLES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    /// Replaces the role order.
    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
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
}

#[async_trait]
impl Topology for SequentialTopology {
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
        self.roles.clone()
    }
}
