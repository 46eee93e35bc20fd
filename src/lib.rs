pub mod agents;
pub mod config;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod project;
pub mod util;
