use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::agents::agent::Agent;
use crate::llm::TokenUsage;

/// Replace every `{key}` in `template` with its value from `inputs`.
/// Unknown placeholders are left untouched.
pub fn interpolate(template: &str, inputs: &HashMap<String, String>) -> String {
    inputs.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{}}}", key), value)
    })
}

#[derive(Debug, Clone)]
pub struct Task {
    pub description: String,
    pub expected_output: String,
    pub agent: Arc<Agent>,
}

impl Task {
    pub fn new(
        description: impl Into<String>,
        expected_output: impl Into<String>,
        agent: Arc<Agent>,
    ) -> Self {
        Self {
            description: description.into(),
            expected_output: expected_output.into(),
            agent,
        }
    }

    pub fn interpolate(&self, inputs: &HashMap<String, String>) -> Task {
        Task {
            description: interpolate(&self.description, inputs),
            expected_output: interpolate(&self.expected_output, inputs),
            agent: self.agent.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutput {
    pub description: String,
    pub agent_role: String,
    pub raw: String,
    pub usage: TokenUsage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_known_and_unknown_keys() {
        let inputs = HashMap::from([("topic".to_string(), "Rust async".to_string())]);
        assert_eq!(
            interpolate("Research {topic} and {topic} trends, cite {source}", &inputs),
            "Research Rust async and Rust async trends, cite {source}"
        );
    }

    #[test]
    fn test_interpolate_without_inputs() {
        assert_eq!(interpolate("plain {text}", &HashMap::new()), "plain {text}");
    }
}
