use super::utils::defaults::test_config;
use super::utils::workspace::assert_no_workspaces;
use crate::{
    languages::skip_if_not_available, CodeExecutionService, ExecutionRequest, ExecutionResult,
    ExecutionStatus, Result,
};
use tempfile::tempdir;

pub mod cpp;
pub mod java;
pub mod javascript;
pub mod rust;

// Common test utilities for language tests

/// Run `code` under `language` in a throwaway root; `None` when `tools`
/// are missing on this host.
pub(crate) async fn run_snippet(
    tools: &[&str],
    language: &str,
    code: &str,
    input: Option<&str>,
) -> Result<Option<ExecutionResult>> {
    if skip_if_not_available(tools) {
        return Ok(None);
    }
    let root = tempdir()?;
    let service = CodeExecutionService::new(test_config(root.path()))?;

    let mut request = ExecutionRequest::new(language, code);
    if let Some(input) = input {
        request = request.with_input(input);
    }

    let result = service.execute(request).await;
    assert_no_workspaces(root.path());
    Ok(Some(result))
}

pub(crate) async fn test_language_execution(
    tools: &[&str],
    language: &str,
    code: &str,
) -> Result<()> {
    if let Some(result) = run_snippet(tools, language, code, None).await? {
        assert!(result.success(), "{:?}", result);
        assert!(result.stdout.contains("Hello from"));
        assert_eq!(result.error_message(), "");
    }
    Ok(())
}

pub(crate) async fn test_language_compile_error(
    tools: &[&str],
    language: &str,
    code: &str,
) -> Result<()> {
    if let Some(result) = run_snippet(tools, language, code, None).await? {
        assert_eq!(result.status, ExecutionStatus::CompilationError);
        assert!(result.stdout.is_empty());
        assert!(!result.error_message().is_empty());
    }
    Ok(())
}
