use codejudge::{Submission, TestCase, Verdict};
use serde_json::json;

use super::{fixture_source, test_judge};

#[tokio::test]
#[ignore = "requires docker"]
async fn test_accepted_submission() {
    let (judge, _root) = test_judge();
    let submission = Submission::new("python", fixture_source("two_sum.py"))
        .with_function_name("twoSum")
        .with_test_case(TestCase::new(
            vec![json!([2, 7, 11, 15]), json!(9)],
            Some(json!([0, 1])),
        ))
        .with_test_case(TestCase::new(vec![json!([3, 2, 4]), json!(6)], Some(json!([1, 2]))).hidden());

    let verdict = judge.judge(&submission).await.expect("Judging failed");

    assert_eq!(verdict.verdict, Verdict::Accepted, "{verdict:?}");
    assert_eq!(verdict.passed_count, 2);
    assert_eq!(verdict.total_count, 2);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_wrong_answer_submission() {
    let (judge, _root) = test_judge();
    let submission = Submission::new("javascript", fixture_source("two_sum.js"))
        .with_function_name("twoSum")
        .with_test_case(TestCase::new(
            vec![json!([2, 7, 11, 15]), json!(9)],
            Some(json!([0, 1])),
        ))
        .with_test_case(TestCase::new(
            vec![json!([3, 3]), json!(6)],
            Some(json!([1, 0])),
        ));

    let verdict = judge.judge(&submission).await.expect("Judging failed");

    assert_eq!(verdict.verdict, Verdict::WrongAnswer);
    assert_eq!(verdict.passed_count, 1);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_timeout_outranks_wrong_answer() {
    let (judge, _root) = test_judge();
    let source = "def solve(n):\n    while n < 0:\n        pass\n    return n\n";
    let submission = Submission::new("python", source)
        .with_time_limit_ms(1000)
        .with_test_case(TestCase::new(vec![json!(1)], Some(json!(1))))
        .with_test_case(TestCase::new(vec![json!(-1)], Some(json!(-1))))
        .with_test_case(TestCase::new(vec![json!(2)], Some(json!(3))));

    let verdict = judge.judge(&submission).await.expect("Judging failed");

    assert_eq!(verdict.verdict, Verdict::TimeLimitExceeded);
    assert_eq!(verdict.passed_count, 1);
}
