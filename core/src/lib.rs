pub mod cli;
pub mod config;
pub mod executor;
pub mod parser;
pub mod tasks;
pub mod transcript;

// Re-export main types
pub use executor::{
    ActionOutput, ActionResult, ErrorKind, ExecError, ExecutorOptions, ProgramExecutor,
    RecommendedAction, Value,
};
pub use tasks::{CommandRegistry, Domain, DomainSchema};
pub use transcript::{Conversation, Transcript, Turn};
