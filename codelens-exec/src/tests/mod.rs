use std::time::{Duration, Instant};
use tempfile::tempdir;

use crate::{
    languages::skip_if_not_available, CodeExecutor, ExecutionRequest, ExecutionStatus, Language,
    LanguageOverride, Phase, Result,
};
use fixtures::{code_samples::*, failing_code::*, test_scenarios::*};
use utils::{
    defaults::{short_timeout_config, test_config},
    workspace::assert_no_workspaces,
};

mod languages;

#[tokio::test]
async fn test_unsupported_language_creates_no_workspace() -> Result<()> {
    let root = tempdir()?;
    let executor = CodeExecutor::new(&test_config(root.path()))?;

    let (result, phases) = executor
        .execute_traced(ExecutionRequest::new("cobol", "print(1)"))
        .await;

    assert!(!result.success());
    assert_eq!(result.status, ExecutionStatus::UnsupportedLanguage);
    assert_eq!(result.error_message(), "unsupported language: cobol");
    assert!(result.stdout.is_empty());
    assert_eq!(phases, vec![Phase::Received, Phase::Done]);
    assert_no_workspaces(root.path());
    Ok(())
}

#[tokio::test]
async fn test_hello_world_literal() -> Result<()> {
    if skip_if_not_available(&["python3"]) {
        return Ok(());
    }
    let root = tempdir()?;
    let executor = CodeExecutor::new(&test_config(root.path()))?;

    let (result, phases) = executor
        .execute_traced(ExecutionRequest::new("python", PYTHON_HELLO_WORLD))
        .await;

    assert!(result.success(), "{:?}", result);
    assert_eq!(result.stdout, "Hello World\n");
    assert_eq!(result.error_message(), "");
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(
        phases,
        vec![
            Phase::Received,
            Phase::ProfileResolved,
            Phase::WorkspacePrepared,
            Phase::Running,
            Phase::Completed,
            Phase::WorkspaceReleased,
            Phase::Done,
        ]
    );
    assert_no_workspaces(root.path());
    Ok(())
}

#[tokio::test]
async fn test_compile_failure_never_runs() -> Result<()> {
    if skip_if_not_available(&["g++"]) {
        return Ok(());
    }
    let root = tempdir()?;
    let executor = CodeExecutor::new(&test_config(root.path()))?;

    let (result, phases) = executor
        .execute_traced(ExecutionRequest::new("cpp", CPP_SYNTAX_ERROR))
        .await;

    assert_eq!(result.status, ExecutionStatus::CompilationError);
    assert!(!result.success());
    assert!(result.stdout.is_empty());
    assert!(result.error_message().contains("error"));
    assert!(phases.contains(&Phase::CompileFailed));
    assert!(!phases.contains(&Phase::Running));
    assert_eq!(phases.last(), Some(&Phase::Done));
    assert_no_workspaces(root.path());
    Ok(())
}

#[tokio::test]
async fn test_infinite_loop_times_out() -> Result<()> {
    if skip_if_not_available(&["python3"]) {
        return Ok(());
    }
    let root = tempdir()?;
    let executor = CodeExecutor::new(&short_timeout_config(root.path(), &[Language::Python]))?;

    let start = Instant::now();
    let (result, phases) = executor
        .execute_traced(ExecutionRequest::new("python", PYTHON_INFINITE_LOOP))
        .await;

    assert!(start.elapsed() < Duration::from_secs(4));
    assert!(result.timed_out());
    assert!(!result.success());
    assert_eq!(result.error_message(), "execution timed out after 1s");
    assert!(phases.contains(&Phase::TimedOut));
    assert_no_workspaces(root.path());
    Ok(())
}

#[tokio::test]
async fn test_partial_output_survives_timeout() -> Result<()> {
    if skip_if_not_available(&["python3"]) {
        return Ok(());
    }
    let root = tempdir()?;
    let executor = CodeExecutor::new(&short_timeout_config(root.path(), &[Language::Python]))?;

    let result = executor
        .execute(ExecutionRequest::new("python", PYTHON_PRINT_THEN_LOOP))
        .await;

    assert!(result.timed_out());
    assert_eq!(result.stdout, "first line\n");
    assert_no_workspaces(root.path());
    Ok(())
}

#[tokio::test]
async fn test_runtime_failure_keeps_stdout() -> Result<()> {
    if skip_if_not_available(&["python3"]) {
        return Ok(());
    }
    let root = tempdir()?;
    let executor = CodeExecutor::new(&test_config(root.path()))?;

    let (result, phases) = executor
        .execute_traced(ExecutionRequest::new("python", PYTHON_RAISES))
        .await;

    assert_eq!(result.status, ExecutionStatus::RuntimeError);
    assert_eq!(result.stdout, "before\n");
    assert!(result.error_message().contains("ValueError: boom"));
    assert_eq!(result.exit_code, Some(1));
    assert!(phases.contains(&Phase::RuntimeFailed));
    assert_no_workspaces(root.path());
    Ok(())
}

#[tokio::test]
async fn test_silent_nonzero_exit_reports_code() -> Result<()> {
    if skip_if_not_available(&["python3"]) {
        return Ok(());
    }
    let root = tempdir()?;
    let executor = CodeExecutor::new(&test_config(root.path()))?;

    let result = executor
        .execute(ExecutionRequest::new("python", PYTHON_SILENT_EXIT))
        .await;

    assert_eq!(result.status, ExecutionStatus::RuntimeError);
    assert_eq!(result.exit_code, Some(3));
    assert_eq!(result.error_message(), "process exited with code 3");
    Ok(())
}

#[tokio::test]
async fn test_missing_toolchain_is_reported() -> Result<()> {
    let root = tempdir()?;
    let mut config = test_config(root.path());
    config.languages.insert(
        Language::Python,
        LanguageOverride {
            run: Some(vec![
                "codelens-missing-python".to_string(),
                "{source}".to_string(),
            ]),
            ..Default::default()
        },
    );
    let executor = CodeExecutor::new(&config)?;

    let (result, phases) = executor
        .execute_traced(ExecutionRequest::new("python", PYTHON_HELLO))
        .await;

    assert_eq!(result.status, ExecutionStatus::SystemError);
    assert_eq!(
        result.error_message(),
        "toolchain not available: codelens-missing-python"
    );
    assert!(phases.contains(&Phase::WorkspaceReleased));
    assert_no_workspaces(root.path());
    Ok(())
}

#[tokio::test]
async fn test_workspace_failure_is_terminal() -> Result<()> {
    let root = tempdir()?;
    let blocker = root.path().join("not-a-dir");
    std::fs::write(&blocker, b"file")?;
    let executor = CodeExecutor::new(&test_config(&blocker))?;

    let (result, phases) = executor
        .execute_traced(ExecutionRequest::new("python", PYTHON_HELLO))
        .await;

    assert_eq!(result.status, ExecutionStatus::SystemError);
    assert!(result.error_message().starts_with("Workspace error"));
    assert_eq!(
        phases,
        vec![Phase::Received, Phase::ProfileResolved, Phase::Done]
    );
    Ok(())
}

#[tokio::test]
async fn test_output_is_capped() -> Result<()> {
    if skip_if_not_available(&["python3"]) {
        return Ok(());
    }
    let root = tempdir()?;
    let executor = CodeExecutor::new(&test_config(root.path()))?;

    let result = executor
        .execute(ExecutionRequest::new("python", PYTHON_FLOOD))
        .await;

    assert!(result.success(), "{:?}", result);
    assert!(result.truncated);
    assert_eq!(result.stdout.len(), 10_000);
    Ok(())
}

#[tokio::test]
async fn test_stdin_is_forwarded() -> Result<()> {
    if skip_if_not_available(&["python3"]) {
        return Ok(());
    }
    let root = tempdir()?;
    let executor = CodeExecutor::new(&test_config(root.path()))?;

    let result = executor
        .execute(ExecutionRequest::new("python", PYTHON_WITH_INPUT).with_input("test user\n"))
        .await;

    assert!(result.success(), "{:?}", result);
    assert_eq!(result.stdout, "Hello, test user!\n");
    Ok(())
}

#[tokio::test]
async fn test_workspace_holds_only_the_source() -> Result<()> {
    if skip_if_not_available(&["python3"]) {
        return Ok(());
    }
    let root = tempdir()?;
    let executor = CodeExecutor::new(&test_config(root.path()))?;

    let result = executor
        .execute(ExecutionRequest::new("python", PYTHON_LIST_WORKSPACE))
        .await;

    assert_eq!(result.stdout, "['main.py']\n");
    Ok(())
}
