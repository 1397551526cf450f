//! Append-only audit record of one graph run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Context key a finalizer writes the run's final decision to. It is copied
/// into the trace when the trace is sealed.
pub const FINAL_DECISION_KEY: &str = "final_decision";

/// Maximum number of characters kept from a task's output snapshot
pub const MAX_OUTPUT_SNAPSHOT: usize = 500;

/// Record of a single task call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub tool_input: Value,
    pub tool_output: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: f64,
    pub success: bool,
    pub error: Option<String>,
}

/// Why the selector picked what it picked, and what came of it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub step_number: usize,
    pub thought: String,
    pub action: String,
    pub observation: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub reasoning_steps: Vec<ReasoningStep>,
    pub tool_invocations: Vec<ToolInvocation>,
    pub final_decision: Option<String>,
}

impl ExecutionTrace {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            start_time: Utc::now(),
            end_time: None,
            reasoning_steps: Vec::new(),
            tool_invocations: Vec::new(),
            final_decision: None,
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn record_success(
        &mut self,
        tool_name: &str,
        input: Option<Value>,
        output: Option<&Value>,
        duration_ms: f64,
    ) {
        if self.is_sealed() {
            return;
        }
        self.tool_invocations.push(ToolInvocation {
            tool_name: tool_name.to_string(),
            tool_input: input.unwrap_or(Value::Null),
            tool_output: output.map(truncate_snapshot).unwrap_or_default(),
            timestamp: Utc::now(),
            duration_ms,
            success: true,
            error: None,
        });
    }

    pub fn record_failure(&mut self, tool_name: &str, duration_ms: f64, error: String) {
        if self.is_sealed() {
            return;
        }
        self.tool_invocations.push(ToolInvocation {
            tool_name: tool_name.to_string(),
            tool_input: Value::Null,
            tool_output: String::new(),
            timestamp: Utc::now(),
            duration_ms,
            success: false,
            error: Some(error),
        });
    }

    /// Starts a reasoning step and returns its number
    pub fn record_reasoning(&mut self, thought: impl Into<String>, action: impl Into<String>) -> usize {
        let step_number = self.reasoning_steps.len() + 1;
        if !self.is_sealed() {
            self.reasoning_steps.push(ReasoningStep {
                step_number,
                thought: thought.into(),
                action: action.into(),
                observation: String::new(),
                timestamp: Utc::now(),
            });
        }
        step_number
    }

    pub fn observe(&mut self, observation: impl Into<String>) {
        if self.is_sealed() {
            return;
        }
        if let Some(step) = self.reasoning_steps.last_mut() {
            let observation: String = observation.into();
            step.observation = observation.chars().take(200).collect();
        }
    }

    pub fn seal(&mut self, final_decision: Option<String>) {
        if self.is_sealed() {
            return;
        }
        self.final_decision = final_decision;
        self.end_time = Some(Utc::now());
    }

    pub fn successful_invocations(&self) -> usize {
        self.tool_invocations.iter().filter(|i| i.success).count()
    }
}

fn truncate_snapshot(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    text.chars().take(MAX_OUTPUT_SNAPSHOT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn output_snapshot_is_truncated() {
        let mut trace = ExecutionTrace::new("s1");
        let long = json!("x".repeat(2_000));
        trace.record_success("report", None, Some(&long), 1.0);

        assert_eq!(trace.tool_invocations[0].tool_output.len(), MAX_OUTPUT_SNAPSHOT);
        assert!(trace.tool_invocations[0].success);
    }

    #[test]
    fn sealed_trace_is_frozen() {
        let mut trace = ExecutionTrace::new("s1");
        trace.record_failure("policy", 2.0, "boom".into());
        trace.seal(Some("REVIEW".into()));
        trace.record_failure("history", 2.0, "late".into());
        trace.seal(Some("APPROVED".into()));

        assert_eq!(trace.tool_invocations.len(), 1);
        assert_eq!(trace.final_decision.as_deref(), Some("REVIEW"));
        assert!(trace.end_time.is_some());
    }
}
