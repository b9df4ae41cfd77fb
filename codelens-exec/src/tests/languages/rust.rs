use super::*;
use crate::tests::fixtures::{code_samples::RUST_HELLO, failing_code::RUST_TYPE_ERROR};

#[tokio::test]
async fn test_rust_basic() -> Result<()> {
    test_language_execution(&["rustc"], "rust", RUST_HELLO).await
}

#[tokio::test]
async fn test_rust_compile_error() -> Result<()> {
    if let Some(result) = run_snippet(&["rustc"], "rs", RUST_TYPE_ERROR, None).await? {
        assert_eq!(result.status, ExecutionStatus::CompilationError);
        assert!(result.error_message().contains("mismatched types"));
    }
    Ok(())
}

#[tokio::test]
async fn test_rust_panic_is_runtime_error() -> Result<()> {
    let code = "fn main() {\n    println!(\"before\");\n    panic!(\"boom\");\n}";
    if let Some(result) = run_snippet(&["rustc"], "rust", code, None).await? {
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert_eq!(result.stdout, "before\n");
        assert_eq!(result.exit_code, Some(101));
    }
    Ok(())
}
