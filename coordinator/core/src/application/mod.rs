pub mod deadline;
pub mod dependency;
pub mod task_service;

pub use deadline::{calculate_deadline, DeadlineReaper, ReaperReport};
pub use dependency::DependencyResolver;
pub use task_service::{CreateTask, TaskDetail, TaskService};
