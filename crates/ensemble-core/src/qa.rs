use crate::state::{LifecycleField, ProjectState};
use serde_json::Value;

/// Pass/fail predicate over the latest QA report artifact.
///
/// The gate passes when the report's test pass rate meets the threshold and
/// it reports zero critical bugs. A missing or malformed report fails the
/// gate: readiness must be proven, not assumed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QaGate {
    /// Minimum acceptable test pass rate.
    pub pass_threshold: f64,
}

impl Default for QaGate {
    fn default() -> Self {
        Self {
            pass_threshold: 0.85,
        }
    }
}

impl QaGate {
    /// Creates a gate with a custom pass-rate threshold.
    pub fn with_threshold(pass_threshold: f64) -> Self {
        Self { pass_threshold }
    }

    /// Evaluates the gate against the latest `qa_report` artifact.
    pub fn passed(&self, state: &ProjectState) -> bool {
        let Some(summary) = latest_summary(state) else {
            return false;
        };
        let pass_rate = summary
            .get("test_pass_rate")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let critical_bugs = summary
            .get("critical_bugs")
            .and_then(Value::as_i64)
            .unwrap_or(1);
        pass_rate >= self.pass_threshold && critical_bugs == 0
    }

    /// Content-addressed signature of the latest QA failure: pass rate,
    /// critical/major bug counts, and the sorted set of bug identifiers.
    ///
    /// Two QA rounds with the same signature reported the same problems;
    /// the anti-loop check pairs this with the backend/frontend artifact
    /// versions to detect stagnation.
    pub fn signature(state: &ProjectState) -> String {
        let Some(report) = state.get_latest_artifact(LifecycleField::QaReport.as_str()) else {
            return "qa:none".to_string();
        };
        if !report.content.is_object() {
            return "qa:none".to_string();
        }

        let summary = report.content.get("summary");
        let field = |key: &str| -> String {
            summary
                .and_then(|s| s.get(key))
                .map(|v| v.to_string())
                .unwrap_or_else(|| "na".to_string())
        };

        let mut bug_ids: Vec<String> = report
            .content
            .get("bug_reports")
            .and_then(Value::as_array)
            .map(|bugs| {
                bugs.iter()
                    .filter_map(|bug| bug.get("bug_id"))
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        bug_ids.sort();

        format!(
            "qa:pass_rate={}|critical={}|major={}|bugs={}",
            field("test_pass_rate"),
            field("critical_bugs"),
            field("major_bugs"),
            bug_ids.join(",")
        )
    }
}

fn latest_summary(state: &ProjectState) -> Option<&serde_json::Map<String, Value>> {
    state
        .get_latest_artifact(LifecycleField::QaReport.as_str())?
        .content
        .get("summary")?
        .as_object()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::artifact::Artifact;
    use serde_json::json;

    fn state_with_report(content: serde_json::Value) -> ProjectState {
        let mut state = ProjectState::new();
        state.register_artifact("qa_report", Artifact::new("qa-report", "qa_report", content));
        state
    }

    #[test]
    fn test_missing_report_fails_gate() {
        let state = ProjectState::new();
        assert!(!QaGate::default().passed(&state));
        assert_eq!(QaGate::signature(&state), "qa:none");
    }

    #[test]
    fn test_passing_report() {
        let state = state_with_report(json!({
            "summary": {"test_pass_rate": 1.0, "critical_bugs": 0, "major_bugs": 0},
            "bug_reports": [],
        }));
        assert!(QaGate::default().passed(&state));
    }

    #[test]
    fn test_threshold_and_critical_bugs() {
        let below = state_with_report(json!({
            "summary": {"test_pass_rate": 0.8, "critical_bugs": 0},
        }));
        assert!(!QaGate::default().passed(&below));
        assert!(QaGate::with_threshold(0.5).passed(&below));

        let critical = state_with_report(json!({
            "summary": {"test_pass_rate": 1.0, "critical_bugs": 1},
        }));
        assert!(!QaGate::default().passed(&critical));
    }

    #[test]
    fn test_malformed_summary_fails_gate() {
        let state = state_with_report(json!({"summary": "not an object"}));
        assert!(!QaGate::default().passed(&state));
    }

    #[test]
    fn test_signature_sorts_bug_ids() {
        let state = state_with_report(json!({
            "summary": {"test_pass_rate": 0.4, "critical_bugs": 1, "major_bugs": 1},
            "bug_reports": [
                {"bug_id": "BUG-2"},
                {"bug_id": "BUG-1"},
                {"bug_id": "  "},
            ],
        }));
        assert_eq!(
            QaGate::signature(&state),
            "qa:pass_rate=0.4|critical=1|major=1|bugs=BUG-1,BUG-2"
        );
    }

    #[test]
    fn test_identical_reports_share_signature() {
        let content = json!({
            "summary": {"test_pass_rate": 0.5, "critical_bugs": 1, "major_bugs": 1},
            "bug_reports": [{"bug_id": "BUG-IF-ALWAYS"}],
        });
        let a = state_with_report(content.clone());
        let b = state_with_report(content);
        assert_eq!(QaGate::signature(&a), QaGate::signature(&b));
    }
}
