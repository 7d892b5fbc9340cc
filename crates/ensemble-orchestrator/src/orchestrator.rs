use ensemble_core::{
    AgentMessage, Artifact, EnsembleError, EnsembleResult, LifecycleField, MessageType,
    ProjectState, ReviewOutcome, TaskExecutor,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Sender name used for engine-originated messages (kickoff, feedback
/// routing).
pub const ORCHESTRATOR_SENDER: &str = "orchestrator";

/// Execution summary for one agent turn.
///
/// Produced once per turn, immutable afterwards, and accumulated into the
/// run-level turn history. Control turns synthesized by topologies (review
/// verdicts, budget exhaustion) use the same shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResult {
    /// Role whose executor ran (or was charged with) this turn.
    pub role: String,
    /// Whether the turn completed and its output was merged.
    pub success: bool,
    /// `key:vN` references for every artifact registered by the turn.
    #[serde(default)]
    pub artifacts_registered: Vec<String>,
    /// Number of messages routed by the turn.
    #[serde(default)]
    pub messages_emitted: usize,
    /// Tokens consumed by the turn.
    #[serde(default)]
    pub usage_tokens: u64,
    /// API calls made by the turn.
    #[serde(default)]
    pub usage_api_calls: u64,
    /// Lifecycle slots updated by the turn.
    #[serde(default)]
    pub updated_fields: Vec<LifecycleField>,
    /// Cooperative termination request.
    #[serde(default)]
    pub stop: bool,
    /// Failure description, if the turn did not succeed.
    #[serde(default)]
    pub error: Option<String>,
}

impl TurnResult {
    /// A failed turn with no state applied.
    pub fn failed(role: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            success: false,
            artifacts_registered: Vec::new(),
            messages_emitted: 0,
            usage_tokens: 0,
            usage_api_calls: 0,
            updated_fields: Vec::new(),
            stop: false,
            error: Some(error.into()),
        }
    }

    /// A terminal control turn: failed, `stop = true`, with a descriptive
    /// error so callers can distinguish budget exhaustion from a crash.
    pub fn control(role: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            stop: true,
            ..Self::failed(role, error)
        }
    }
}

/// The turn scheduler.
///
/// Owns the shared [`ProjectState`] for the duration of a run, a registry of
/// role name → executor, and the accumulating turn history. Exactly one turn
/// executes at a time; an executor failure never crashes the scheduler and
/// never leaves partially-applied state.
#[derive(Default)]
pub struct Orchestrator {
    state: ProjectState,
    agents: HashMap<String, Box<dyn TaskExecutor>>,
    turn_history: Vec<TurnResult>,
}

impl Orchestrator {
    /// Creates a scheduler with a fresh project state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scheduler over an existing state (e.g. restored from a
    /// snapshot).
    pub fn with_state(state: ProjectState) -> Self {
        Self {
            state,
            agents: HashMap::new(),
            turn_history: Vec::new(),
        }
    }

    /// Registers an executor under its own role name, replacing any previous
    /// registration for that role.
    pub fn register_agent(&mut self, agent: Box<dyn TaskExecutor>) {
        self.agents.insert(agent.role().to_string(), agent);
    }

    /// True if `role` has a registered executor.
    pub fn has_agent(&self, role: &str) -> bool {
        self.agents.contains_key(role)
    }

    /// The shared project state.
    pub fn state(&self) -> &ProjectState {
        &self.state
    }

    /// Mutable access to the shared state for topology-level counters
    /// (iteration). Lifecycle slots must still only change through
    /// [`Self::run_turn`].
    pub fn state_mut(&mut self) -> &mut ProjectState {
        &mut self.state
    }

    /// Complete ordered audit trail of every attempt, including failed and
    /// retried ones.
    pub fn turn_history(&self) -> &[TurnResult] {
        &self.turn_history
    }

    /// Consumes the scheduler, returning the final state.
    pub fn into_state(self) -> ProjectState {
        self.state
    }

    /// Asks `role`'s executor to review an artifact. An unregistered role is
    /// a configuration error, exactly as in [`Self::run_turn`].
    pub fn review_artifact(
        &mut self,
        role: &str,
        artifact: &Artifact,
    ) -> EnsembleResult<ReviewOutcome> {
        let agent = self
            .agents
            .get_mut(role)
            .ok_or_else(|| EnsembleError::UnknownRole(role.to_string()))?;
        Ok(agent.review(artifact))
    }

    /// Routes a message: broadcast delivers to every registered role except
    /// the sender; a directed message is delivered only if the receiver is
    /// registered. The message is appended to the log in all cases — the log
    /// is the durable record, delivery is best-effort.
    pub fn route_message(&mut self, message: AgentMessage) {
        if message.is_broadcast() {
            for (role, agent) in &mut self.agents {
                if role != &message.sender {
                    agent.receive(&message);
                }
            }
        } else if let Some(agent) = self.agents.get_mut(&message.receiver) {
            agent.receive(&message);
        } else {
            debug!(receiver = %message.receiver, "receiver not registered; message logged only");
        }
        self.state.add_message(message);
    }

    /// Sends the initial TASK message that seeds a run.
    pub fn kickoff(&mut self, receiver: &str, content: &str) -> AgentMessage {
        let message = AgentMessage::new(ORCHESTRATOR_SENDER, receiver, content, MessageType::Task);
        self.route_message(message.clone());
        message
    }

    /// Runs one agent turn and merges its output into the shared state.
    ///
    /// An unregistered role is a fatal configuration error. An executor
    /// failure is converted into a failed [`TurnResult`] with **no** state
    /// mutation; state updates are only merged after the executor returns a
    /// well-formed output.
    pub async fn run_turn(&mut self, role: &str) -> EnsembleResult<TurnResult> {
        let output = {
            let agent = self
                .agents
                .get_mut(role)
                .ok_or_else(|| EnsembleError::UnknownRole(role.to_string()))?;
            agent.act(&self.state).await
        };

        let output = match output {
            Ok(output) => output,
            Err(err) => {
                warn!(role, error = %err, "turn failed; no state applied");
                let result = TurnResult::failed(role, err.to_string());
                self.turn_history.push(result.clone());
                return Ok(result);
            }
        };

        if !output.usage.is_zero() {
            self.state
                .update_usage(output.usage.tokens, output.usage.api_calls);
        }

        let mut updated_fields = Vec::new();
        for (key, value) in output.state_updates {
            match LifecycleField::from_key(&key) {
                Some(field) => {
                    self.state.set_lifecycle(field, value);
                    updated_fields.push(field);
                }
                None => debug!(role, key, "state update outside lifecycle whitelist ignored"),
            }
        }

        let mut artifacts_registered = Vec::new();
        for draft in output.artifacts {
            let mut artifact = draft.artifact;
            if artifact.producer.is_empty() {
                artifact.producer = role.to_string();
            }
            let stored = self.state.register_artifact(&draft.store_key, artifact);
            artifacts_registered.push(format!("{}:v{}", draft.store_key, stored.version));
        }

        let mut messages_emitted = 0;
        for mut message in output.messages {
            if message.sender.is_empty() {
                message.sender = role.to_string();
            }
            self.route_message(message);
            messages_emitted += 1;
        }

        let result = TurnResult {
            role: role.to_string(),
            success: true,
            artifacts_registered,
            messages_emitted,
            usage_tokens: output.usage.tokens,
            usage_api_calls: output.usage.api_calls,
            updated_fields,
            stop: output.stop,
            error: None,
        };
        info!(
            role,
            artifacts = result.artifacts_registered.len(),
            messages = result.messages_emitted,
            stop = result.stop,
            "turn complete"
        );
        self.turn_history.push(result.clone());
        Ok(result)
    }

    /// Runs a fixed sequence of roles, stopping immediately when a turn
    /// fails or signals `stop`. Returns all results produced, including the
    /// terminal one.
    pub async fn run_sequence(&mut self, roles: &[String]) -> EnsembleResult<Vec<TurnResult>> {
        let mut results = Vec::new();
        for role in roles {
            let result = self.run_turn(role).await?;
            let done = !result.success || result.stop;
            results.push(result);
            if done {
                break;
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ensemble_core::{Artifact, TurnOutput};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Executor that replays a scripted list of outputs and records every
    /// delivered message in a shared inbox.
    struct ScriptedExecutor {
        role: String,
        outputs: VecDeque<EnsembleResult<TurnOutput>>,
        inbox: Arc<Mutex<Vec<AgentMessage>>>,
    }

    impl ScriptedExecutor {
        fn new(role: &str, outputs: Vec<EnsembleResult<TurnOutput>>) -> Self {
            Self {
                role: role.to_string(),
                outputs: outputs.into(),
                inbox: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn inbox(&self) -> Arc<Mutex<Vec<AgentMessage>>> {
            Arc::clone(&self.inbox)
        }
    }

    #[async_trait]
    impl TaskExecutor for ScriptedExecutor {
        fn role(&self) -> &str {
            &self.role
        }

        async fn act(&mut self, _state: &ProjectState) -> EnsembleResult<TurnOutput> {
            self.outputs
                .pop_front()
                .unwrap_or_else(|| Ok(TurnOutput::new()))
        }

        fn receive(&mut self, message: &AgentMessage) {
            self.inbox.lock().unwrap().push(message.clone());
        }
    }

    #[tokio::test]
    async fn test_unknown_role_is_fatal() {
        let mut orch = Orchestrator::new();
        let err = orch.run_turn("ghost").await.unwrap_err();
        assert!(matches!(err, EnsembleError::UnknownRole(role) if role == "ghost"));
    }

    #[tokio::test]
    async fn test_failed_executor_applies_no_state() {
        let mut orch = Orchestrator::new();
        orch.register_agent(Box::new(ScriptedExecutor::new(
            "backend_dev",
            vec![Err(EnsembleError::Executor("model timeout".into()))],
        )));

        let result = orch.run_turn("backend_dev").await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("executor error: model timeout"));
        assert_eq!(orch.state().total_tokens(), 0);
        assert!(orch.state().artifact_store().keys().is_empty());
        assert!(orch.state().message_log().is_empty());
        assert_eq!(orch.turn_history().len(), 1);
    }

    #[tokio::test]
    async fn test_successful_turn_merges_output() {
        let output = TurnOutput::new()
            .with_state_update(
                LifecycleField::BackendCode,
                json!({"artifact_ref": "backend_code:v1"}),
            )
            .with_artifact(
                "backend_code",
                Artifact::new("backend-auth-module", "backend_code", json!({"module": "auth"})),
            )
            .with_message(AgentMessage::draft(
                "frontend_dev",
                "Backend ready.",
                MessageType::Task,
            ))
            .with_usage(680, 1);

        let mut orch = Orchestrator::new();
        orch.register_agent(Box::new(ScriptedExecutor::new("backend_dev", vec![Ok(output)])));
        let frontend = ScriptedExecutor::new("frontend_dev", vec![]);
        let inbox = frontend.inbox();
        orch.register_agent(Box::new(frontend));

        let result = orch.run_turn("backend_dev").await.unwrap();
        assert!(result.success);
        assert_eq!(result.artifacts_registered, vec!["backend_code:v1"]);
        assert_eq!(result.updated_fields, vec![LifecycleField::BackendCode]);
        assert_eq!(result.messages_emitted, 1);

        // Producer and sender default to the acting role.
        let stored = orch.state().get_latest_artifact("backend_code").unwrap();
        assert_eq!(stored.producer, "backend_dev");
        let delivered = inbox.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].sender, "backend_dev");

        assert_eq!(orch.state().total_tokens(), 680);
        assert_eq!(orch.state().total_api_calls(), 1);
    }

    #[tokio::test]
    async fn test_state_update_whitelist() {
        let mut updates = TurnOutput::new().with_state_update(
            LifecycleField::Requirements,
            json!({"artifact_ref": "requirements:v1"}),
        );
        updates
            .state_updates
            .insert("total_tokens".to_string(), json!(999_999));
        updates
            .state_updates
            .insert("bogus_field".to_string(), json!("x"));

        let mut orch = Orchestrator::new();
        orch.register_agent(Box::new(ScriptedExecutor::new("pm", vec![Ok(updates)])));

        let result = orch.run_turn("pm").await.unwrap();
        assert_eq!(result.updated_fields, vec![LifecycleField::Requirements]);
        assert_eq!(orch.state().total_tokens(), 0);
        assert!(orch
            .state()
            .lifecycle(LifecycleField::Requirements)
            .is_some());
    }

    #[tokio::test]
    async fn test_broadcast_routing() {
        let mut orch = Orchestrator::new();
        let pm = ScriptedExecutor::new("pm", vec![]);
        let qa = ScriptedExecutor::new("qa", vec![]);
        let pm_inbox = pm.inbox();
        let qa_inbox = qa.inbox();
        orch.register_agent(Box::new(pm));
        orch.register_agent(Box::new(qa));

        orch.route_message(AgentMessage::new(
            "pm",
            ensemble_core::BROADCAST,
            "heads up",
            MessageType::Status,
        ));

        assert!(pm_inbox.lock().unwrap().is_empty());
        assert_eq!(qa_inbox.lock().unwrap().len(), 1);
        assert_eq!(orch.state().message_log().len(), 1);
    }

    #[tokio::test]
    async fn test_unroutable_message_still_logged() {
        let mut orch = Orchestrator::new();
        orch.route_message(AgentMessage::new(
            "pm",
            "nobody",
            "into the void",
            MessageType::Status,
        ));
        assert_eq!(orch.state().message_log().len(), 1);
    }

    #[tokio::test]
    async fn test_run_sequence_stops_on_failure() {
        let mut orch = Orchestrator::new();
        orch.register_agent(Box::new(ScriptedExecutor::new(
            "pm",
            vec![Ok(TurnOutput::new().with_usage(420, 1))],
        )));
        orch.register_agent(Box::new(ScriptedExecutor::new(
            "architect",
            vec![Err(EnsembleError::Executor("boom".into()))],
        )));
        orch.register_agent(Box::new(ScriptedExecutor::new("qa", vec![])));

        let roles: Vec<String> = ["pm", "architect", "qa"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let results = orch.run_sequence(&roles).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(!results[1].success);
    }

    #[tokio::test]
    async fn test_run_sequence_stops_on_stop_flag() {
        let mut orch = Orchestrator::new();
        orch.register_agent(Box::new(ScriptedExecutor::new(
            "devops",
            vec![Ok(TurnOutput::new().with_stop())],
        )));
        orch.register_agent(Box::new(ScriptedExecutor::new("qa", vec![])));

        let roles: Vec<String> = ["devops", "qa"].iter().map(ToString::to_string).collect();
        let results = orch.run_sequence(&roles).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].stop);
    }

    #[tokio::test]
    async fn test_kickoff_logs_task_message() {
        let mut orch = Orchestrator::new();
        let message = orch.kickoff("pm", "Build the auth slice");
        assert_eq!(message.sender, ORCHESTRATOR_SENDER);
        assert_eq!(message.msg_type, MessageType::Task);
        assert_eq!(orch.state().message_log().by_receiver("pm").len(), 1);
    }
}
