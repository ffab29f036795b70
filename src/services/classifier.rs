use crate::domain::models::{Bucket, CheckRecord, Polarity};
use crate::services::invoker::{InvocationResult, Outcome, ToolError};
use crate::services::payload::{display_state, Extract};
use serde_json::Value;

/// Files a comparison into one of the four buckets. Pure and total.
///
/// A negative check passes when the state it guards against did not show up.
pub fn classify(
    actual: &Value,
    expected: &Value,
    polarity: Polarity,
    action: &str,
    message: impl Into<String>,
) -> CheckRecord {
    let matched = actual == expected;
    let passed = match polarity {
        Polarity::Positive => matched,
        Polarity::Negative => !matched,
    };
    record(action, polarity, Bucket::of(polarity, passed), message)
}

/// Failure record for a check that could not be evaluated at all.
pub fn explicit_failure(polarity: Polarity, action: &str, message: impl Into<String>) -> CheckRecord {
    record(action, polarity, Bucket::of(polarity, false), message)
}

fn record(action: &str, polarity: Polarity, bucket: Bucket, message: impl Into<String>) -> CheckRecord {
    CheckRecord {
        action: action.to_string(),
        polarity,
        bucket,
        message: message.into(),
    }
}

/// One way a tool rejection can be recognised.
#[derive(Clone, Debug, PartialEq)]
pub enum FailureMatch {
    Message(String),
    MessageContains(String),
    HttpCode(u16),
    /// Whole error body equals this value (bare-string bodies such as `"Unauthorized"`).
    Body(Value),
}

impl FailureMatch {
    fn matches(&self, err: &ToolError) -> bool {
        match self {
            FailureMatch::Message(m) => err.message.as_deref() == Some(m.as_str()),
            FailureMatch::MessageContains(m) => {
                err.message.as_deref().is_some_and(|msg| msg.contains(m.as_str()))
            }
            FailureMatch::HttpCode(code) => err.httpcode == Some(*code),
            FailureMatch::Body(body) => &err.body == body,
        }
    }
}

/// A rejection the check anticipates, and the state it stands for.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpectedFailure {
    matchers: Vec<FailureMatch>,
    actual: Value,
    note: String,
}

impl ExpectedFailure {
    /// `actual` is the state the rejection implies; `note` becomes the record message.
    pub fn new(actual: impl Into<Value>, note: &str) -> Self {
        Self {
            matchers: Vec::new(),
            actual: actual.into(),
            note: note.to_string(),
        }
    }

    pub fn message(mut self, msg: &str) -> Self {
        self.matchers.push(FailureMatch::Message(msg.to_string()));
        self
    }

    pub fn message_contains(mut self, fragment: &str) -> Self {
        self.matchers
            .push(FailureMatch::MessageContains(fragment.to_string()));
        self
    }

    pub fn httpcode(mut self, code: u16) -> Self {
        self.matchers.push(FailureMatch::HttpCode(code));
        self
    }

    pub fn body(mut self, body: impl Into<Value>) -> Self {
        self.matchers.push(FailureMatch::Body(body.into()));
        self
    }

    /// Any one matcher is enough.
    pub fn matches(&self, err: &ToolError) -> bool {
        self.matchers.iter().any(|m| m.matches(err))
    }
}

pub fn match_expected_failure<'a>(
    err: &ToolError,
    cases: &'a [ExpectedFailure],
) -> Option<&'a ExpectedFailure> {
    cases.iter().find(|case| case.matches(err))
}

/// Full classification of one invocation result.
pub fn classify_result(
    result: &InvocationResult,
    expected: &Value,
    extract: &Extract,
    expected_failures: &[ExpectedFailure],
    polarity: Polarity,
    action: &str,
    subject: &str,
) -> CheckRecord {
    match &result.outcome {
        Outcome::Success(payload) => match extract.apply(payload) {
            Ok(actual) => {
                let message = if &actual == expected {
                    format!("{}; state: {}", subject, display_state(&actual))
                } else {
                    format!(
                        "{}; state: {} (wanted {})",
                        subject,
                        display_state(&actual),
                        display_state(expected)
                    )
                };
                classify(&actual, expected, polarity, action, message)
            }
            Err(e) => explicit_failure(polarity, action, format!("{}; error: {}", subject, e)),
        },
        Outcome::StructuredFailure(err) => match match_expected_failure(err, expected_failures) {
            Some(case) => classify(&case.actual, expected, polarity, action, case.note.clone()),
            None => explicit_failure(
                polarity,
                action,
                format!("{}; error: {}", subject, result.diagnostic()),
            ),
        },
        Outcome::TransportFailure(_) => explicit_failure(
            polarity,
            action,
            format!("{}; error: {}", subject, result.diagnostic()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::invoker::TransportError;
    use crate::services::payload::Payload;
    use proptest::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    fn result(outcome: Outcome) -> InvocationResult {
        InvocationResult {
            outcome,
            exit_code: Some(0),
            stdout: Vec::new(),
            stderr: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    fn rejected(body: Value) -> InvocationResult {
        result(Outcome::StructuredFailure(ToolError::from_body(body)))
    }

    fn state_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            "[a-z]{1,10}".prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
        ]
    }

    proptest! {
        #[test]
        fn equal_states_follow_polarity(v in state_value()) {
            prop_assert_eq!(classify(&v, &v, Polarity::Positive, "a", "").bucket, Bucket::PositivePass);
            prop_assert_eq!(classify(&v, &v, Polarity::Negative, "a", "").bucket, Bucket::NegativeFail);
        }

        #[test]
        fn different_states_invert(a in state_value(), b in state_value()) {
            prop_assume!(a != b);
            prop_assert_eq!(classify(&a, &b, Polarity::Positive, "a", "").bucket, Bucket::PositiveFail);
            prop_assert_eq!(classify(&a, &b, Polarity::Negative, "a", "").bucket, Bucket::NegativePass);
        }

        #[test]
        fn explicit_failure_stays_in_its_polarity(negative in any::<bool>()) {
            let polarity = if negative { Polarity::Negative } else { Polarity::Positive };
            let rec = explicit_failure(polarity, "a", "boom");
            prop_assert!(!rec.bucket.passed());
            prop_assert_eq!(rec.bucket.polarity(), polarity);
        }
    }

    #[test]
    fn matching_state_passes_with_action_in_line() {
        let mut m = serde_json::Map::new();
        m.insert("state".to_string(), json!("enabled"));
        let rec = classify_result(
            &result(Outcome::Success(Payload::Object(m))),
            &json!("enabled"),
            &Extract::field("state"),
            &[],
            Polarity::Positive,
            "account_get",
            "account acme",
        );
        assert_eq!(rec.bucket, Bucket::PositivePass);
        assert_eq!(rec.line(), "account_get - account acme; state: enabled");
    }

    #[test]
    fn expected_rejection_synthesizes_state() {
        let cases = [ExpectedFailure::new("enabled", "rejected while enabled")
            .message_contains("Invalid state change")];
        let rec = classify_result(
            &rejected(json!({"httpcode": 400, "message": "Invalid state change requested"})),
            &json!("enabled"),
            &Extract::field("state"),
            &cases,
            Polarity::Positive,
            "account_del",
            "account acme",
        );
        assert_eq!(rec.bucket, Bucket::PositivePass);
        assert_eq!(rec.message, "rejected while enabled");
    }

    #[test]
    fn bare_string_body_matches_by_body_or_message() {
        let err = ToolError::from_body(json!("Unauthorized"));
        assert!(ExpectedFailure::new("notok", "").body("Unauthorized").matches(&err));
        assert!(ExpectedFailure::new("notok", "").message("Unauthorized").matches(&err));
        assert!(!ExpectedFailure::new("notok", "").httpcode(403).matches(&err));
    }

    #[test]
    fn unmatched_rejection_is_an_explicit_failure() {
        let cases = [ExpectedFailure::new("enabled", "").httpcode(404)];
        let rec = classify_result(
            &rejected(json!({"httpcode": 500, "message": "internal"})),
            &json!("deleting"),
            &Extract::field("state"),
            &cases,
            Polarity::Negative,
            "account_del",
            "account acme",
        );
        assert_eq!(rec.bucket, Bucket::NegativeFail);
        assert!(rec.message.contains("internal"));
    }

    #[test]
    fn transport_failure_and_missing_field_fail_explicitly() {
        let rec = classify_result(
            &result(Outcome::TransportFailure(TransportError::Unstructured { code: Some(1) })),
            &json!("ok"),
            &Extract::Succeeded,
            &[],
            Polarity::Positive,
            "system_status",
            "system",
        );
        assert_eq!(rec.bucket, Bucket::PositiveFail);

        let rec = classify_result(
            &result(Outcome::Success(Payload::Array(vec![]))),
            &json!("active"),
            &Extract::field("0.image_status"),
            &[],
            Polarity::Negative,
            "image_add",
            "alpine",
        );
        assert_eq!(rec.bucket, Bucket::NegativeFail);
        assert!(rec.message.contains("0.image_status"));
    }
}
