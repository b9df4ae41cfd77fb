use super::*;
use crate::tests::fixtures::{
    code_samples::{CPP_HELLO, C_HELLO},
    failing_code::CPP_SYNTAX_ERROR,
    test_scenarios::CPP_PRINT_THEN_LOOP,
};
use crate::{tests::utils::defaults::short_timeout_config, Language};

#[tokio::test]
async fn test_cpp_basic() -> Result<()> {
    test_language_execution(&["g++"], "cpp", CPP_HELLO).await
}

#[tokio::test]
async fn test_c_basic() -> Result<()> {
    test_language_execution(&["gcc"], "c", C_HELLO).await
}

#[tokio::test]
async fn test_cpp_compile_error() -> Result<()> {
    test_language_compile_error(&["g++"], "c++", CPP_SYNTAX_ERROR).await
}

#[tokio::test]
async fn test_cpp_timeout_keeps_flushed_output() -> Result<()> {
    if skip_if_not_available(&["g++"]) {
        return Ok(());
    }
    let root = tempdir()?;
    let service = CodeExecutionService::new(short_timeout_config(root.path(), &[Language::Cpp]))?;

    let result = service
        .execute(ExecutionRequest::new("cpp", CPP_PRINT_THEN_LOOP))
        .await;

    assert!(result.timed_out(), "{:?}", result);
    assert_eq!(result.stdout, "first line\n");
    assert_no_workspaces(root.path());
    Ok(())
}

#[tokio::test]
async fn test_c_stdin() -> Result<()> {
    let code = "#include <stdio.h>\nint main(void) { int a, b; scanf(\"%d %d\", &a, &b); printf(\"%d\\n\", a + b); return 0; }";
    if let Some(result) = run_snippet(&["gcc"], "c", code, Some("2 40\n")).await? {
        assert_eq!(result.stdout, "42\n");
    }
    Ok(())
}
