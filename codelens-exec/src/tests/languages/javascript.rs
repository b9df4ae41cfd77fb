use super::*;
use crate::tests::fixtures::{
    code_samples::JS_HELLO, failing_code::JS_THROWS, test_scenarios::JS_WITH_TIMEOUT,
};
use crate::{tests::utils::defaults::short_timeout_config, Language};

#[tokio::test]
async fn test_javascript_basic() -> Result<()> {
    test_language_execution(&["node"], "javascript", JS_HELLO).await
}

#[tokio::test]
async fn test_javascript_throw() -> Result<()> {
    if let Some(result) = run_snippet(&["node"], "node", JS_THROWS, None).await? {
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert_eq!(result.stdout, "before\n");
    }
    Ok(())
}

#[tokio::test]
async fn test_javascript_timeout() -> Result<()> {
    if skip_if_not_available(&["node"]) {
        return Ok(());
    }
    let root = tempdir()?;
    let service =
        CodeExecutionService::new(short_timeout_config(root.path(), &[Language::JavaScript]))?;

    let result = service
        .execute(ExecutionRequest::new("javascript", JS_WITH_TIMEOUT))
        .await;

    assert!(result.timed_out());
    assert!(!result.stdout.contains("should not print"));
    assert_no_workspaces(root.path());
    Ok(())
}
