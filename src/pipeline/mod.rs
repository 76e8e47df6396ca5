//! The discover → download → extract → summarize pipeline.

pub mod fetch;
pub mod llm;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod scanner;

pub use orchestrator::Orchestrator;
