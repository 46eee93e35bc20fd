//! Parsers for what the agents return.
//!
//! - `developer`: the `<developer_output>` XML document
//! - `plan`: the planner's JSON task list

pub mod developer;
pub mod plan;

pub use developer::{DeveloperOutput, ProjectFile};
pub use plan::{Plan, PlanTask};
