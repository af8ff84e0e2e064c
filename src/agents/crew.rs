use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::agents::agent::{Agent, AgentId};
use crate::agents::task::{Task, TaskOutput};
use crate::error::{ContentError, Result};
use crate::llm::TokenUsage;

const CONTEXT_SEPARATOR: &str = "\n\n----------\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Process {
    Sequential,
}

/// Progress notifications published while a crew runs.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CrewEvent {
    TaskStarted {
        task_index: usize,
        agent_id: AgentId,
        agent_role: String,
    },
    ToolUsed {
        agent_role: String,
        tool: String,
        input: String,
    },
    TaskCompleted {
        task_index: usize,
        agent_role: String,
        output_chars: usize,
    },
    TaskFailed {
        task_index: usize,
        agent_role: String,
        error: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewOutput {
    pub raw: String,
    pub tasks_output: Vec<TaskOutput>,
    pub token_usage: TokenUsage,
}

impl fmt::Display for CrewOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

pub struct Crew {
    agents: Vec<Arc<Agent>>,
    tasks: Vec<Task>,
    process: Process,
    verbose: bool,
    events: broadcast::Sender<CrewEvent>,
}

impl Crew {
    pub fn new(agents: Vec<Arc<Agent>>, tasks: Vec<Task>) -> Result<Self> {
        if tasks.is_empty() {
            return Err(ContentError::AgentError("A crew needs at least one task".to_string()).into());
        }

        for agent in &agents {
            if agent.allow_delegation {
                return Err(ContentError::AgentError(format!(
                    "Agent '{}' allows delegation, which sequential crews do not support",
                    agent.role
                ))
                .into());
            }
        }

        for task in &tasks {
            if !agents.iter().any(|a| Arc::ptr_eq(a, &task.agent)) {
                return Err(ContentError::AgentError(format!(
                    "Task agent '{}' is not a member of the crew",
                    task.agent.role
                ))
                .into());
            }
        }

        let (events, _) = broadcast::channel(256);
        Ok(Self {
            agents,
            tasks,
            process: Process::Sequential,
            verbose: false,
            events,
        })
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn agents(&self) -> &[Arc<Agent>] {
        &self.agents
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn process(&self) -> Process {
        self.process
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CrewEvent> {
        self.events.subscribe()
    }

    /// Run every task in order. Each task sees the raw output of all earlier tasks as context.
    pub async fn kickoff(&self, inputs: &HashMap<String, String>) -> Result<CrewOutput> {
        let started = Instant::now();
        if self.verbose {
            info!(
                "Crew kickoff: {} agents, {} tasks, {:?} process",
                self.agents.len(),
                self.tasks.len(),
                self.process
            );
        }

        let mut outputs: Vec<TaskOutput> = Vec::with_capacity(self.tasks.len());
        let mut token_usage = TokenUsage::default();

        for (task_index, task) in self.tasks.iter().enumerate() {
            let agent = task.agent.interpolate(inputs);
            let task = task.interpolate(inputs);
            let context = outputs
                .iter()
                .map(|o| o.raw.as_str())
                .collect::<Vec<_>>()
                .join(CONTEXT_SEPARATOR);

            let _ = self.events.send(CrewEvent::TaskStarted {
                task_index,
                agent_id: agent.id,
                agent_role: agent.role.clone(),
            });

            let output = match agent.execute_task(&task, &context, &self.events).await {
                Ok(output) => output,
                Err(e) => {
                    warn!("Task {} failed for agent '{}': {}", task_index, agent.role, e);
                    let _ = self.events.send(CrewEvent::TaskFailed {
                        task_index,
                        agent_role: agent.role.clone(),
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            };

            let _ = self.events.send(CrewEvent::TaskCompleted {
                task_index,
                agent_role: agent.role.clone(),
                output_chars: output.raw.len(),
            });

            token_usage += output.usage;
            outputs.push(output);
        }

        let raw = outputs.last().map(|o| o.raw.clone()).unwrap_or_default();
        if raw.trim().is_empty() {
            return Err(ContentError::AgentError("No content generated".to_string()).into());
        }

        if self.verbose {
            info!(
                "Crew finished in {:?} using {} tokens over {} requests",
                started.elapsed(),
                token_usage.total_tokens(),
                token_usage.successful_requests
            );
        }

        Ok(CrewOutput {
            raw,
            tasks_output: outputs,
            token_usage,
        })
    }
}
