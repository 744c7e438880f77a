use std::time::{Duration, Instant};

use codejudge::{ExecutionRequest, Verdict};
use serde_json::json;

use super::{fixture_source, test_judge};

#[tokio::test]
#[ignore = "requires docker"]
async fn test_infinite_loop_times_out() {
    let (judge, _root) = test_judge();
    // make sure the image is present before timing anything
    let warmup = ExecutionRequest::new("python", fixture_source("chatty.py"))
        .with_args(vec![json!(1), json!(1)]);
    judge.execute(&warmup).await.expect("Warmup failed");

    let request = ExecutionRequest::new("python", fixture_source("spin.py"))
        .with_args(vec![json!(0)])
        .with_time_limit_ms(1000);

    let started = Instant::now();
    let result = judge.execute(&request).await.expect("Execution failed");

    assert_eq!(result.status, Verdict::TimeLimitExceeded);
    assert_eq!(result.runtime_ms, 1000);
    assert_eq!(result.stdout, None);
    // limit plus kill grace, with slack for container startup
    assert!(started.elapsed() < Duration::from_secs(15));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_memory_hog_is_runtime_error() {
    let (judge, _root) = test_judge();
    let request = ExecutionRequest::new("python", fixture_source("hog.py"))
        .with_args(vec![json!(0)])
        .with_time_limit_ms(10_000);

    let result = judge.execute(&request).await.expect("Execution failed");

    assert_eq!(result.status, Verdict::RuntimeError);
    assert!(
        result
            .stderr_lines
            .iter()
            .any(|line| line.contains("memory") || line.contains("MemoryError"))
    );
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_network_is_disabled() {
    let (judge, _root) = test_judge();
    let cases = [
        ("python", "network.py"),
        ("javascript", "network.js"),
        ("java", "Network.java"),
        ("cpp", "network.cpp"),
    ];

    for (language, fixture) in cases {
        let request = ExecutionRequest::new(language, fixture_source(fixture))
            .with_args(vec![json!("1.1.1.1")]);

        let result = judge.execute(&request).await.expect("Execution failed");

        assert!(result.is_success(), "{language}: {result:?}");
        assert_eq!(result.stdout.as_deref(), Some("\"blocked\""), "{language}");
    }
}
