pub mod detector;
pub mod harness;
pub mod installer;
pub mod runner;
pub mod venv;

pub use runner::{
    CancelToken, ExecutionFailure, ExecutionRequest, ExecutionResult, FailureReason,
    SandboxExecutor,
};
