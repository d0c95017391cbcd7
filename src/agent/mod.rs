pub mod assemble;
pub mod contradiction;
pub mod extract;
pub mod prompts;
pub mod rules;
pub mod telemetry;
pub mod validate;
pub mod workflow;
