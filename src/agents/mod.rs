pub mod agent;
pub mod crew;
pub mod task;


pub use agent::{Agent, AgentBuilder, AgentId, AgentStep};
pub use crew::{Crew, CrewEvent, CrewOutput, Process};
pub use task::{interpolate, Task, TaskOutput};
