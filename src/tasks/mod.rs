pub mod catalog;
pub mod departments;
pub mod register;

pub use departments::AgentPair;
pub use register::{summarize_counts, RegisterError, TaskFilter, TaskProgress, TaskRegister, TaskSummary};
