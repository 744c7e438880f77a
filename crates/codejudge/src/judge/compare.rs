//! Output comparison

use serde_json::{Number, Value};

/// Compare a driver's result line against the expected value
///
/// The line is parsed as JSON and compared structurally. When it is not
/// valid JSON, the trimmed text is compared with a string expected value.
pub fn outputs_match(stdout: Option<&str>, expected: &Value, tolerance: f64) -> bool {
    let Some(raw) = stdout else {
        return false;
    };
    let raw = raw.trim();

    match serde_json::from_str::<Value>(raw) {
        Ok(actual) => values_match(&actual, expected, tolerance),
        Err(_) => matches!(expected, Value::String(text) if text.trim() == raw),
    }
}

/// Deep equality with numeric tolerance
///
/// Arrays are order-sensitive. Integers compare exactly against integers;
/// any comparison involving a float uses an absolute-or-relative epsilon.
pub fn values_match(actual: &Value, expected: &Value, tolerance: f64) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => numbers_match(a, b, tolerance),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b)
                    .all(|(x, y)| values_match(x, y, tolerance))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter().all(|(key, x)| {
                    b.get(key)
                        .is_some_and(|y| values_match(x, y, tolerance))
                })
        }
        _ => actual == expected,
    }
}

fn numbers_match(a: &Number, b: &Number, tolerance: f64) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => floats_match(x, y, tolerance),
        _ => false,
    }
}

fn floats_match(actual: f64, expected: f64, tolerance: f64) -> bool {
    if actual == expected {
        return true;
    }
    let diff = (actual - expected).abs();
    diff <= tolerance || diff <= tolerance * actual.abs().max(expected.abs())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const EPS: f64 = 1e-6;

    #[test]
    fn arrays_are_order_sensitive() {
        assert!(outputs_match(Some("[0,1]"), &json!([0, 1]), EPS));
        assert!(!outputs_match(Some("[1,0]"), &json!([0, 1]), EPS));
        assert!(!outputs_match(Some("[0,1,2]"), &json!([0, 1]), EPS));
    }

    #[test]
    fn whitespace_around_the_line_is_ignored() {
        assert!(outputs_match(Some("  [ 0, 1 ]\r"), &json!([0, 1]), EPS));
    }

    #[test]
    fn missing_output_never_matches() {
        assert!(!outputs_match(None, &json!(null), EPS));
    }

    #[test]
    fn floats_use_tolerance() {
        assert!(outputs_match(Some("0.30000000000000004"), &json!(0.3), EPS));
        assert!(outputs_match(Some("2.0000001"), &json!(2.0), EPS));
        assert!(!outputs_match(Some("2.01"), &json!(2.0), EPS));
        // relative for large magnitudes
        assert!(outputs_match(Some("1000000000.5"), &json!(1_000_000_000.0), EPS));
    }

    #[test]
    fn integers_and_floats_compare_numerically() {
        assert!(outputs_match(Some("5.0"), &json!(5), EPS));
        assert!(outputs_match(Some("5"), &json!(5.0), EPS));
    }

    #[test]
    fn large_integers_compare_exactly() {
        assert!(!outputs_match(
            Some("9007199254740993"),
            &json!(9_007_199_254_740_992_i64),
            EPS
        ));
        assert!(outputs_match(
            Some("18446744073709551615"),
            &json!(u64::MAX),
            EPS
        ));
    }

    #[test]
    fn strings_and_numbers_differ() {
        assert!(!outputs_match(Some("\"5\""), &json!(5), EPS));
        assert!(outputs_match(Some("\"abc\""), &json!("abc"), EPS));
    }

    #[test]
    fn raw_text_falls_back_to_string_comparison() {
        assert!(outputs_match(Some("hello world"), &json!("hello world"), EPS));
        assert!(!outputs_match(Some("hello world"), &json!(["hello"]), EPS));
    }

    #[test]
    fn objects_compare_by_key() {
        assert!(values_match(
            &json!({"a": 1, "b": [1.0000000001]}),
            &json!({"b": [1], "a": 1}),
            EPS
        ));
        assert!(!values_match(&json!({"a": 1}), &json!({"a": 1, "b": 2}), EPS));
    }

    #[test]
    fn booleans_and_null() {
        assert!(outputs_match(Some("true"), &json!(true), EPS));
        assert!(!outputs_match(Some("false"), &json!(true), EPS));
        assert!(outputs_match(Some("null"), &json!(null), EPS));
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    proptest! {
        #[test]
        fn integers_match_themselves_only(a in any::<i64>(), b in any::<i64>()) {
            prop_assert!(values_match(&json!(a), &json!(a), 1e-6));
            prop_assert_eq!(values_match(&json!(a), &json!(b), 1e-6), a == b);
        }

        #[test]
        fn float_match_is_symmetric(a in -1e6f64..1e6, b in -1e6f64..1e6) {
            prop_assert_eq!(
                values_match(&json!(a), &json!(b), 1e-6),
                values_match(&json!(b), &json!(a), 1e-6)
            );
        }
    }
}
