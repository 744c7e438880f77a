use codejudge::ExecutionRequest;
use serde_json::json;

use super::{fixture_source, test_judge};

fn entries(root: &std::path::Path) -> usize {
    std::fs::read_dir(root).map(|dir| dir.count()).unwrap_or(0)
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_workspace_removed_after_success() {
    let (judge, root) = test_judge();
    let request = ExecutionRequest::new("python", fixture_source("chatty.py"))
        .with_args(vec![json!(1), json!(1)]);

    judge.execute(&request).await.expect("Execution failed");

    assert_eq!(entries(root.path()), 0);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_workspace_removed_after_timeout() {
    let (judge, root) = test_judge();
    let request = ExecutionRequest::new("python", fixture_source("spin.py"))
        .with_args(vec![json!(0)])
        .with_time_limit_ms(500);

    judge.execute(&request).await.expect("Execution failed");

    assert_eq!(entries(root.path()), 0);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_workspace_removed_after_compile_error() {
    let (judge, root) = test_judge();
    let request =
        ExecutionRequest::new("cpp", fixture_source("syntax_error.cpp")).with_args(vec![json!(1)]);

    judge.execute(&request).await.expect("Execution failed");

    assert_eq!(entries(root.path()), 0);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_health_check() {
    let (judge, _root) = test_judge();
    judge.health().await.expect("Docker daemon unreachable");
}
