use codejudge::{ExecutionRequest, Verdict};
use serde_json::json;

use super::{fixture_source, test_judge};

fn two_sum(language: &str, fixture: &str) -> ExecutionRequest {
    ExecutionRequest::new(language, fixture_source(fixture))
        .with_function_name("twoSum")
        .with_args(vec![json!([2, 7, 11, 15]), json!(9)])
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_python_two_sum() {
    let (judge, _root) = test_judge();
    let result = judge
        .execute(&two_sum("python", "two_sum.py"))
        .await
        .expect("Execution failed");

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.stdout.as_deref(), Some("[0, 1]"));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_javascript_two_sum() {
    let (judge, _root) = test_judge();
    let result = judge
        .execute(&two_sum("javascript", "two_sum.js"))
        .await
        .expect("Execution failed");

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.stdout.as_deref(), Some("[0,1]"));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_java_two_sum() {
    let (judge, _root) = test_judge();
    let result = judge
        .execute(&two_sum("java", "Solution.java"))
        .await
        .expect("Execution failed");

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.stdout.as_deref(), Some("[0,1]"));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_cpp_two_sum() {
    let (judge, _root) = test_judge();
    let result = judge
        .execute(&two_sum("cpp", "two_sum.cpp"))
        .await
        .expect("Execution failed");

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.stdout.as_deref(), Some("[0,1]"));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_user_prints_go_to_logs() {
    let (judge, _root) = test_judge();
    let request = ExecutionRequest::new("python", fixture_source("chatty.py"))
        .with_args(vec![json!(2), json!(3)]);

    let result = judge.execute(&request).await.expect("Execution failed");

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.stdout.as_deref(), Some("5"));
    assert!(result.stderr_lines.iter().any(|line| line == "adding 2 3"));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_exception_is_runtime_error() {
    let (judge, _root) = test_judge();
    let request =
        ExecutionRequest::new("javascript", fixture_source("throws.js")).with_args(vec![json!(1)]);

    let result = judge.execute(&request).await.expect("Execution failed");

    assert_eq!(result.status, Verdict::RuntimeError);
    assert!(result.stderr_lines.iter().any(|line| line.contains("boom 1")));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_syntax_error_is_compile_error() {
    let (judge, _root) = test_judge();
    let request =
        ExecutionRequest::new("cpp", fixture_source("syntax_error.cpp")).with_args(vec![json!(1)]);

    let result = judge.execute(&request).await.expect("Execution failed");

    assert_eq!(result.status, Verdict::CompileError);
    assert!(!result.stderr_lines.is_empty());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_missing_function_is_compile_error() {
    let (judge, _root) = test_judge();
    let request = two_sum("python", "two_sum.py").with_function_name("threeSum");

    let result = judge.execute(&request).await.expect("Execution failed");

    assert_eq!(result.status, Verdict::CompileError);
    assert!(result.stderr_lines.iter().any(|line| line.contains("threeSum")));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_repeated_execution_is_deterministic() {
    let (judge, _root) = test_judge();
    let cases = [
        ("python", "two_sum.py"),
        ("javascript", "two_sum.js"),
        ("java", "Solution.java"),
        ("cpp", "two_sum.cpp"),
    ];

    for (language, fixture) in cases {
        let request = two_sum(language, fixture);
        let first = judge.execute(&request).await.expect("Execution failed");
        let second = judge.execute(&request).await.expect("Execution failed");

        assert_eq!(first.status, second.status, "{language}");
        assert_eq!(first.stdout, second.stdout, "{language}");
        assert_eq!(first.stderr_lines, second.stderr_lines, "{language}");
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_builtin_name_is_not_a_user_function() {
    let (judge, _root) = test_judge();
    let cases = [
        ("python", "two_sum.py", "max"),
        ("javascript", "two_sum.js", "parseInt"),
    ];

    for (language, fixture, name) in cases {
        let request = two_sum(language, fixture).with_function_name(name);

        let result = judge.execute(&request).await.expect("Execution failed");

        assert_eq!(result.status, Verdict::CompileError, "{language}");
        assert!(
            result.stderr_lines.iter().any(|line| line.contains("not found")),
            "{language}: {result:?}"
        );
        assert!(
            !result.stderr_lines.iter().any(|line| line.contains("codejudge-setup-")),
            "{language}"
        );
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_user_exit_code_three_is_runtime_error() {
    let (judge, _root) = test_judge();
    let cases = [
        ("python", "import os\n\ndef solve():\n    os._exit(3)\n"),
        ("javascript", "function solve() { process.exit(3); }\n"),
        (
            "java",
            "public class Solution { public int solve() { System.exit(3); return 0; } }\n",
        ),
        ("cpp", "#include <cstdlib>\n\nint solve() { std::exit(3); }\n"),
    ];

    for (language, source) in cases {
        let request = ExecutionRequest::new(language, source);

        let result = judge.execute(&request).await.expect("Execution failed");

        assert_eq!(result.status, Verdict::RuntimeError, "{language}: {result:?}");
    }
}
