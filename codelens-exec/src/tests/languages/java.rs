use super::*;
use crate::tests::fixtures::{code_samples::JAVA_HELLO, failing_code::JAVA_SYNTAX_ERROR};

#[tokio::test]
async fn test_java_public_class_names_the_file() -> Result<()> {
    // JAVA_HELLO declares `public class Greeter`, so the source must be Greeter.java
    test_language_execution(&["javac", "java"], "java", JAVA_HELLO).await
}

#[tokio::test]
async fn test_java_without_public_class() -> Result<()> {
    let code = "class Main {\n    public static void main(String[] a) {\n        System.out.println(\"Hello from Main\");\n    }\n}";
    test_language_execution(&["javac", "java"], "java", code).await
}

#[tokio::test]
async fn test_java_compile_error() -> Result<()> {
    test_language_compile_error(&["javac", "java"], "java", JAVA_SYNTAX_ERROR).await
}
