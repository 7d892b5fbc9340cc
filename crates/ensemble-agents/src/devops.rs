use async_trait::async_trait;
use ensemble_core::{
    AgentMessage, Artifact, EnsembleResult, LifecycleField, MessageLog, ProjectState, TaskExecutor,
    TurnOutput,
};
use serde_json::json;

/// Registers a simulated deployment report and requests termination.
///
/// The stop flag marks the run as complete; topologies honor it between
/// turns, so this is always the final productive turn of a healthy run.
#[derive(Default)]
pub struct DevOpsAgent {
    memory: MessageLog,
}

impl DevOpsAgent {
    /// Creates the agent for the `devops` role.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskExecutor for DevOpsAgent {
    fn role(&self) -> &str {
        "devops"
    }

    async fn act(&mut self, _state: &ProjectState) -> EnsembleResult<TurnOutput> {
        let deployment = json!({
            "status": "success",
            "mode": "local-simulated",
            "services": ["backend", "frontend", "postgres"],
            "health_checks": {"backend": 200, "frontend": 200},
            "access_urls": {
                "frontend": "http://localhost:3000",
                "backend": "http://localhost:8080",
            },
        });

        Ok(TurnOutput::new()
            .with_state_update(
                LifecycleField::Deployment,
                json!({"artifact_ref": "deployment:v1"}),
            )
            .with_artifact(
                "deployment",
                Artifact::new("deployment-report-auth", "deployment", deployment),
            )
            .with_usage(390, 1)
            .with_stop())
    }

    fn receive(&mut self, message: &AgentMessage) {
        self.memory.append(message.clone());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deployment_requests_stop() {
        let mut agent = DevOpsAgent::new();
        let output = agent.act(&ProjectState::new()).await.unwrap();
        assert!(output.stop);
        assert!(output.messages.is_empty());
        assert_eq!(output.artifacts[0].store_key, "deployment");
        assert_eq!(output.usage.tokens, 390);
    }
}
