//! # CodeLens snippet execution
//!
//! Runs untrusted source snippets for the CodeLens review service. A request
//! names a language and carries source text; the snippet is written into a
//! throwaway workspace, compiled if the language needs it, run under a
//! wall-clock deadline, and always answered with an [`ExecutionResult`].
//!
//! ```no_run
//! # async fn demo() -> codelens_exec::Result<()> {
//! use codelens_exec::{CodeExecutionService, ExecConfig, ExecutionRequest};
//!
//! let service = CodeExecutionService::new(ExecConfig::default())?;
//! let result = service
//!     .execute(ExecutionRequest::new("python", "print('Hello World')"))
//!     .await;
//! assert_eq!(result.stdout, "Hello World\n");
//! # Ok(())
//! # }
//! ```

mod config;
pub mod detect;
mod error;
mod executor;
mod languages;
mod runner;
mod service;
mod types;
mod workspace;

#[cfg(test)]
mod tests;

pub use config::{ExecConfig, LanguageOverride};
pub use error::Error;
pub use executor::{CodeExecutor, Phase};
pub use languages::{builtin_profile, LanguageProfile, ProfileRegistry, SourceLayout, SourceNaming};
pub use runner::{ProcessOutput, ProcessRunner};
pub use service::CodeExecutionService;
pub use types::{
    duration_serde, ExecutionRequest, ExecutionResult, ExecutionStatus, Language, ResourceLimits,
};
pub use workspace::Workspace;

/// Result type for code execution operations
pub type Result<T> = std::result::Result<T, Error>;
