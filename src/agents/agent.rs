use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agents::crew::CrewEvent;
use crate::agents::task::{interpolate, Task, TaskOutput};
use crate::error::{ContentError, Result};
use crate::llm::{ChatMessage, CompletionRequest, LanguageModel, TokenUsage};
use crate::tools::Tool;

pub type AgentId = Uuid;

pub const DEFAULT_MAX_ITERATIONS: usize = 6;

const FINAL_ANSWER: &str = "Final Answer:";
const ACTION: &str = "Action:";
const ACTION_INPUT: &str = "Action Input:";
const OBSERVATION: &str = "Observation:";

const FORMAT_REMINDER: &str = "I did not use the expected format. I MUST either use a tool \
(Thought, Action, Action Input) or give my best final answer (Thought, Final Answer).";

const FORCE_FINAL_ANSWER: &str = "Now it's time you MUST give your absolute best final answer. \
You'll ignore all previous instructions, stop using any tools, and just return your absolute BEST Final answer.";

/// One parsed model reply inside the reasoning loop.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentStep {
    FinalAnswer(String),
    Action { tool: String, input: String, log: String },
    Unparsed,
}

impl AgentStep {
    /// Parse a ReAct style reply. A complete tool call before `Final Answer:` wins;
    /// otherwise the final answer does.
    pub fn parse(text: &str) -> AgentStep {
        let final_at = text.find(FINAL_ANSWER);
        let action_at = find_action(text);
        let final_answer = |f: usize| AgentStep::FinalAnswer(text[f + FINAL_ANSWER.len()..].trim().to_string());

        match (action_at, final_at) {
            (Some(a), Some(f)) if a < f => match parse_action(&text[..f], a) {
                AgentStep::Unparsed => final_answer(f),
                step => step,
            },
            (_, Some(f)) => final_answer(f),
            (Some(a), None) => parse_action(text, a),
            (None, None) => AgentStep::Unparsed,
        }
    }
}

// `Action Input:` also contains "Action", so look for the bare label at a line start.
fn find_action(text: &str) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_start().starts_with(ACTION) {
            return Some(offset + (line.len() - line.trim_start().len()));
        }
        offset += line.len();
    }
    None
}

fn parse_action(text: &str, action_at: usize) -> AgentStep {
    let rest = &text[action_at + ACTION.len()..];
    let tool = rest.lines().next().unwrap_or_default().trim().to_string();

    let Some(input_at) = rest.find(ACTION_INPUT) else {
        return AgentStep::Unparsed;
    };
    let after_input = &rest[input_at + ACTION_INPUT.len()..];
    let end = after_input.find(OBSERVATION).unwrap_or(after_input.len());
    let input = after_input[..end].trim().trim_matches('"').to_string();

    let log_end = action_at + ACTION.len() + input_at + ACTION_INPUT.len() + end;
    AgentStep::Action {
        tool,
        input,
        log: text[..log_end].trim_end().to_string(),
    }
}

/// An LLM-backed worker with a role, a goal and optional tools.
#[derive(Clone)]
pub struct Agent {
    pub id: AgentId,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub allow_delegation: bool,
    pub verbose: bool,
    pub max_iterations: usize,
    pub temperature: f32,
    tools: Vec<Arc<dyn Tool>>,
    llm: Arc<dyn LanguageModel>,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("goal", &self.goal)
            .field("allow_delegation", &self.allow_delegation)
            .field("verbose", &self.verbose)
            .field("tools", &self.tool_names())
            .field("llm", &self.llm.model_id())
            .finish()
    }
}

pub struct AgentBuilder {
    role: String,
    goal: String,
    backstory: String,
    allow_delegation: bool,
    verbose: bool,
    max_iterations: usize,
    temperature: f32,
    tools: Vec<Arc<dyn Tool>>,
    llm: Arc<dyn LanguageModel>,
}

impl AgentBuilder {
    pub fn goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = backstory.into();
        self
    }

    pub fn allow_delegation(mut self, allow: bool) -> Self {
        self.allow_delegation = allow;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    pub fn build(self) -> Result<Agent> {
        if self.role.trim().is_empty() {
            return Err(ContentError::AgentError("Agent role cannot be empty".to_string()).into());
        }
        if self.goal.trim().is_empty() {
            return Err(ContentError::AgentError(format!("Agent '{}' needs a goal", self.role)).into());
        }
        if self.max_iterations == 0 {
            return Err(ContentError::AgentError("max_iterations must be greater than 0".to_string()).into());
        }

        Ok(Agent {
            id: Uuid::new_v4(),
            role: self.role,
            goal: self.goal,
            backstory: self.backstory,
            allow_delegation: self.allow_delegation,
            verbose: self.verbose,
            max_iterations: self.max_iterations,
            temperature: self.temperature,
            tools: self.tools,
            llm: self.llm,
        })
    }
}

impl Agent {
    pub fn builder(role: impl Into<String>, llm: Arc<dyn LanguageModel>) -> AgentBuilder {
        AgentBuilder {
            role: role.into(),
            goal: String::new(),
            backstory: String::new(),
            allow_delegation: false,
            verbose: false,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            temperature: 0.7,
            tools: Vec::new(),
            llm,
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Copy of this agent with `{key}` placeholders filled from `inputs`.
    pub fn interpolate(&self, inputs: &HashMap<String, String>) -> Agent {
        Agent {
            role: interpolate(&self.role, inputs),
            goal: interpolate(&self.goal, inputs),
            backstory: interpolate(&self.backstory, inputs),
            ..self.clone()
        }
    }

    pub fn system_prompt(&self) -> String {
        let mut prompt = format!(
            "You are {}. {}\nYour personal goal is: {}",
            self.role, self.backstory, self.goal
        );

        if self.tools.is_empty() {
            prompt.push_str(
                "\n\nTo give my best complete final answer to the task use the exact following format:\n\n\
                 Thought: I now can give a great answer\n\
                 Final Answer: Your final answer must be the great and the most complete as possible, it must be outcome described.\n\n\
                 I MUST use these formats, my job depends on it!",
            );
            return prompt;
        }

        prompt.push_str("\n\nYou ONLY have access to the following tools, and should NEVER make up tools that are not listed here:\n\n");
        for tool in &self.tools {
            prompt.push_str(&format!("Tool Name: {}\nTool Description: {}\n", tool.name(), tool.description()));
        }
        prompt.push_str(&format!(
            "\nUse the following format:\n\n\
             Thought: you should always think about what to do\n\
             Action: the action to take, only one name of [{}], just the name, exactly as it's written.\n\
             Action Input: the input to the action, just a simple text query\n\
             Observation: the result of the action\n\n\
             Once all necessary information is gathered:\n\n\
             Thought: I now know the final answer\n\
             Final Answer: the final answer to the original input question",
            self.tool_names().join(", ")
        ));
        prompt
    }

    pub fn task_prompt(task: &Task, context: &str) -> String {
        let mut prompt = format!(
            "Current Task: {}\n\nThis is the expect criteria for your final answer: {}\n\
             you MUST return the actual complete content as the final answer, not a summary.",
            task.description.trim(),
            task.expected_output.trim()
        );
        if !context.trim().is_empty() {
            prompt.push_str(&format!("\n\nThis is the context you're working with:\n{}", context.trim()));
        }
        prompt.push_str("\n\nBegin! This is VERY important to you, use the tools available and give your best Final Answer, your job depends on it!\n\nThought:");
        prompt
    }

    async fn use_tool(&self, tool_name: &str, input: &str) -> String {
        let Some(tool) = self.tools.iter().find(|t| t.name().eq_ignore_ascii_case(tool_name.trim())) else {
            warn!("Agent '{}' asked for unknown tool '{}'", self.role, tool_name);
            return format!(
                "I tried to use the tool '{}', but it doesn't exist. I must use one of these tools: {}",
                tool_name,
                self.tool_names().join(", ")
            );
        };

        match tool.run(input).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Tool '{}' failed for agent '{}': {}", tool_name, self.role, e);
                format!("I encountered an error while trying to use the tool. This was the error: {}", e)
            }
        }
    }

    async fn call_llm(&self, messages: &[ChatMessage], usage: &mut TokenUsage) -> Result<String> {
        let completion = self
            .llm
            .complete(CompletionRequest {
                messages: messages.to_vec(),
                temperature: self.temperature,
            })
            .await?;
        *usage += completion.usage;
        Ok(completion.text)
    }

    /// Run the reasoning loop for one task until the model gives a final answer.
    pub async fn execute_task(
        &self,
        task: &Task,
        context: &str,
        events: &broadcast::Sender<CrewEvent>,
    ) -> Result<TaskOutput> {
        let mut messages = vec![
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(Self::task_prompt(task, context)),
        ];
        let mut usage = TokenUsage::default();

        if self.verbose {
            info!("[{}] starting task: {}", self.role, task.description.trim());
        }

        for iteration in 1..=self.max_iterations {
            let reply = self.call_llm(&messages, &mut usage).await?;
            debug!("[{}] iteration {} reply: {} chars", self.role, iteration, reply.len());

            match AgentStep::parse(&reply) {
                AgentStep::FinalAnswer(answer) => return self.finish(task, answer, usage),
                AgentStep::Action { tool, input, log } => {
                    if self.verbose {
                        info!("[{}] using tool '{}' with input {:?}", self.role, tool, input);
                    }
                    let _ = events.send(CrewEvent::ToolUsed {
                        agent_role: self.role.clone(),
                        tool: tool.clone(),
                        input: input.clone(),
                    });
                    let observation = self.use_tool(&tool, &input).await;
                    messages.push(ChatMessage::assistant(log));
                    messages.push(ChatMessage::user(format!("{} {}", OBSERVATION, observation)));
                }
                AgentStep::Unparsed if self.tools.is_empty() => {
                    return self.finish(task, reply.trim().to_string(), usage);
                }
                AgentStep::Unparsed => {
                    debug!("[{}] reply did not follow the format, reminding", self.role);
                    messages.push(ChatMessage::assistant(reply));
                    messages.push(ChatMessage::user(FORMAT_REMINDER));
                }
            }
        }

        warn!(
            "Agent '{}' reached {} iterations without a final answer, forcing one",
            self.role, self.max_iterations
        );
        messages.push(ChatMessage::user(FORCE_FINAL_ANSWER));
        let reply = self.call_llm(&messages, &mut usage).await?;
        let answer = match reply.find(FINAL_ANSWER) {
            Some(at) => reply[at + FINAL_ANSWER.len()..].trim().to_string(),
            None => reply.trim().to_string(),
        };
        self.finish(task, answer, usage)
    }

    fn finish(&self, task: &Task, answer: String, usage: TokenUsage) -> Result<TaskOutput> {
        if answer.is_empty() {
            return Err(ContentError::AgentError(format!("Agent '{}' returned an empty answer", self.role)).into());
        }
        if self.verbose {
            info!("[{}] finished task with {} chars", self.role, answer.len());
        }
        Ok(TaskOutput {
            description: task.description.clone(),
            agent_role: self.role.clone(),
            raw: answer,
            usage,
        })
    }
}
