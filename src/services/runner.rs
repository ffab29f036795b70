use crate::domain::constants::STATE_OK;
use crate::domain::models::{Bucket, CheckRecord, Polarity};
use crate::services::classifier::{classify_result, explicit_failure, match_expected_failure, ExpectedFailure};
use crate::services::invoker::{CallError, Invocation, InvocationResult, Invoke, Outcome};
use crate::services::ledger::Ledger;
use crate::services::payload::{display_state, Extract, Payload};
use crate::services::poller::{Clock, PollTimeout, Poller};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

/// Readiness condition polled before a dependent check runs.
#[derive(Debug)]
pub struct Gate {
    description: String,
    invocation: Invocation,
    extract: Extract,
    ready: Value,
    timeout: PollTimeout,
    interval: Duration,
}

impl Gate {
    pub fn new(
        description: &str,
        invocation: Invocation,
        extract: Extract,
        ready: impl Into<Value>,
    ) -> Self {
        Self {
            description: description.to_string(),
            invocation,
            extract,
            ready: ready.into(),
            timeout: PollTimeout::Once,
            interval: Duration::from_secs(1),
        }
    }

    pub fn every(mut self, timeout: PollTimeout, interval: Duration) -> Self {
        self.timeout = timeout;
        self.interval = interval;
        self
    }
}

/// One named assertion against the tool.
#[derive(Debug)]
pub struct Check {
    action: String,
    polarity: Polarity,
    subject: String,
    invocation: Invocation,
    expected: Value,
    extract: Extract,
    expected_failures: Vec<ExpectedFailure>,
    gate: Option<Gate>,
}

impl Check {
    /// Defaults to "the call succeeded".
    pub fn new(action: &str, polarity: Polarity, invocation: Invocation) -> Self {
        Self {
            action: action.to_string(),
            polarity,
            subject: action.to_string(),
            invocation,
            expected: Value::from(STATE_OK),
            extract: Extract::Succeeded,
            expected_failures: Vec::new(),
            gate: None,
        }
    }

    pub fn positive(action: &str, invocation: Invocation) -> Self {
        Self::new(action, Polarity::Positive, invocation)
    }

    pub fn negative(action: &str, invocation: Invocation) -> Self {
        Self::new(action, Polarity::Negative, invocation)
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn expect(mut self, extract: Extract, expected: impl Into<Value>) -> Self {
        self.extract = extract;
        self.expected = expected.into();
        self
    }

    pub fn expect_field(self, path: &str, expected: impl Into<Value>) -> Self {
        self.expect(Extract::field(path), expected)
    }

    pub fn tolerate(mut self, failure: ExpectedFailure) -> Self {
        self.expected_failures.push(failure);
        self
    }

    pub fn gated_on(mut self, gate: Gate) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckOutcome {
    Recorded(Bucket),
    Skipped,
}

/// Sequences checks: gate, invoke, extract, classify, record.
pub struct Runner<'a, C: Clock> {
    invoker: &'a dyn Invoke,
    ledger: &'a Ledger,
    poller: Poller<C>,
    dump_responses: bool,
}

impl<'a, C: Clock> Runner<'a, C> {
    pub fn new(invoker: &'a dyn Invoke, ledger: &'a Ledger, poller: Poller<C>) -> Self {
        Self {
            invoker,
            ledger,
            poller,
            dump_responses: false,
        }
    }

    pub fn dump_responses(mut self, on: bool) -> Self {
        self.dump_responses = on;
        self
    }

    pub fn run(&self, check: Check) -> CheckOutcome {
        if let Some(gate) = &check.gate {
            if !self.require(&check.action, gate) {
                return CheckOutcome::Skipped;
            }
        }
        let result = self.call(&check.action, &check.invocation);
        let rec = classify_result(
            &result,
            &check.expected,
            &check.extract,
            &check.expected_failures,
            check.polarity,
            &check.action,
            &check.subject,
        );
        if let Some(reason) = unexpected_error(&check, &result) {
            error!("{} | unexpected tool error: {}", check.action, reason);
        }
        CheckOutcome::Recorded(self.ledger.record(rec))
    }

    /// Polls the gate once per interval until it reports the ready value.
    pub fn ready(&self, gate: &Gate) -> bool {
        self.poller
            .wait_until_ready(&gate.description, gate.timeout, gate.interval, |budget| {
                let payload = self
                    .call_within(&gate.description, &gate.invocation, budget)
                    .into_payload()?;
                let state = gate.extract.apply(&payload)?;
                debug!("{} | state: {}", gate.description, display_state(&state));
                Ok(state == gate.ready)
            })
    }

    /// Like `ready`, but logs a skip for `action` when the gate never opens.
    pub fn require(&self, action: &str, gate: &Gate) -> bool {
        if self.ready(gate) {
            return true;
        }
        self.skip(action, &format!("precondition not met: {}", gate.description));
        false
    }

    pub fn call(&self, action: &str, invocation: &Invocation) -> InvocationResult {
        self.call_within(action, invocation, None)
    }

    fn call_within(
        &self,
        action: &str,
        invocation: &Invocation,
        limit: Option<Duration>,
    ) -> InvocationResult {
        debug!("{} | running: {}", action, invocation);
        let result = self.invoker.invoke(invocation, limit);
        debug!(
            "{} | exit code {:?} after {:?}",
            action, result.exit_code, result.elapsed
        );
        if self.dump_responses {
            debug!(
                "{} | stdout: {}",
                action,
                String::from_utf8_lossy(&result.stdout).trim_end()
            );
            if !result.stderr.is_empty() {
                debug!(
                    "{} | stderr: {}",
                    action,
                    String::from_utf8_lossy(&result.stderr).trim_end()
                );
            }
        }
        result
    }

    /// Unrecorded lookup used to set up or derive later checks.
    pub fn query(&self, action: &str, invocation: &Invocation) -> Result<Payload, CallError> {
        self.call(action, invocation).into_payload()
    }

    /// Records a verdict the caller worked out itself.
    pub fn pass(&self, action: &str, polarity: Polarity, message: impl Into<String>) -> Bucket {
        self.ledger.record(CheckRecord {
            action: action.to_string(),
            polarity,
            bucket: Bucket::of(polarity, true),
            message: message.into(),
        })
    }

    pub fn fail(&self, action: &str, polarity: Polarity, message: impl Into<String>) -> Bucket {
        self.ledger.record(explicit_failure(polarity, action, message))
    }

    pub fn skip(&self, action: &str, reason: &str) {
        self.ledger.note_skip(action, reason);
    }
}

/// Why a call went wrong in a way the check did not declare, if it did.
fn unexpected_error(check: &Check, result: &InvocationResult) -> Option<String> {
    match &result.outcome {
        Outcome::Success(payload) => check.extract.apply(payload).err().map(|e| e.to_string()),
        Outcome::StructuredFailure(err) => match_expected_failure(err, &check.expected_failures)
            .is_none()
            .then(|| result.diagnostic()),
        Outcome::TransportFailure(_) => Some(result.diagnostic()),
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedInvoker;
    use super::*;
    use crate::services::invoker::{ResponseShape, ToolError, TransportError};
    use crate::services::poller::FakeClock;
    use serde_json::json;

    fn inv(args: &[&str], shape: ResponseShape) -> Invocation {
        Invocation::new("tool", args.iter().copied(), shape)
    }

    #[test]
    fn enabled_account_passes_positive_check() {
        let tool = ScriptedInvoker::new().json("account get acme", json!({"state": "enabled"}));
        let ledger = Ledger::new();
        let clock = FakeClock::new();
        let runner = Runner::new(&tool, &ledger, Poller::new(&clock));

        let outcome = runner.run(
            Check::positive("account_get", inv(&["account", "get", "acme"], ResponseShape::Object))
                .subject("account acme")
                .expect_field("state", "enabled"),
        );
        assert_eq!(outcome, CheckOutcome::Recorded(Bucket::PositivePass));
        assert!(ledger.summary().positive_pass[0].starts_with("account_get - "));
    }

    #[test]
    fn declared_rejection_counts_as_pass() {
        let tool = ScriptedInvoker::new().reject(
            "account del acme",
            json!({"httpcode": 400, "message": "Invalid state change requested"}),
        );
        let ledger = Ledger::new();
        let runner = Runner::new(&tool, &ledger, Poller::new(FakeClock::new()));

        runner.run(
            Check::positive("account_del", inv(&["account", "del", "acme"], ResponseShape::Object))
                .expect_field("state", "enabled")
                .tolerate(
                    ExpectedFailure::new("enabled", "delete rejected while enabled")
                        .message_contains("Invalid state change"),
                ),
        );
        let summary = ledger.summary();
        assert_eq!(summary.positive_pass, vec!["account_del - delete rejected while enabled"]);
        assert_eq!(ledger.exit_code(), 0);
    }

    #[test]
    fn negative_check_passes_when_the_rejection_shows_up() {
        let blocked = || {
            ExpectedFailure::new("enabled", "account still enabled")
                .message("Invalid account state change requested")
        };
        let tool = ScriptedInvoker::new()
            .reject(
                "account del acme",
                json!({"httpcode": 409, "message": "Invalid account state change requested"}),
            )
            .json("account del acme", json!({"state": "deleting"}));
        let ledger = Ledger::new();
        let runner = Runner::new(&tool, &ledger, Poller::new(FakeClock::new()));
        let check = || {
            Check::negative("account_del", inv(&["account", "del", "acme"], ResponseShape::Object))
                .expect_field("state", "deleting")
                .tolerate(blocked())
        };

        assert_eq!(runner.run(check()), CheckOutcome::Recorded(Bucket::NegativePass));
        // the second scripted answer: the delete went through
        assert_eq!(runner.run(check()), CheckOutcome::Recorded(Bucket::NegativeFail));
        assert_eq!(ledger.summary().negative_pass, vec!["account_del - account still enabled"]);
    }

    #[test]
    fn gate_that_never_opens_records_nothing() {
        let tool = ScriptedInvoker::new()
            .json("image get alpine", json!([{"analysis_status": "analyzing"}]))
            .json("evaluate check alpine", json!([{"status": "pass"}]));
        let ledger = Ledger::new();
        let clock = FakeClock::new();
        let runner = Runner::new(&tool, &ledger, Poller::new(&clock));

        let gate = Gate::new(
            "alpine analyzed",
            inv(&["image", "get", "alpine"], ResponseShape::Array),
            Extract::field("0.analysis_status"),
            "analyzed",
        )
        .every(PollTimeout::Within(Duration::from_secs(10)), Duration::from_secs(5));

        let outcome = runner.run(
            Check::positive("evaluate_check", inv(&["evaluate", "check", "alpine"], ResponseShape::Array))
                .expect(Extract::NonEmpty, "ok")
                .gated_on(gate),
        );
        assert_eq!(outcome, CheckOutcome::Skipped);
        assert_eq!(ledger.total(), 0);
        assert_eq!(ledger.summary().counts.skipped, 1);
        assert_eq!(ledger.exit_code(), 0);
        assert!(tool.calls().iter().all(|c| c.starts_with("image get")));
        // at 0s and 5s; no attempt starts with less than an interval left
        assert_eq!(tool.calls().len(), 2);
        assert_eq!(
            tool.limits(),
            vec![Some(Duration::from_secs(10)), Some(Duration::from_secs(5))]
        );
    }

    #[test]
    fn gate_that_opens_lets_the_check_run() {
        let tool = ScriptedInvoker::new()
            .json("image get alpine", json!([{"analysis_status": "analyzing"}]))
            .json("image get alpine", json!([{"analysis_status": "analyzed"}]))
            .json("evaluate check alpine", json!([{"status": "pass"}]));
        let ledger = Ledger::new();
        let runner = Runner::new(&tool, &ledger, Poller::new(FakeClock::new()));

        let gate = Gate::new(
            "alpine analyzed",
            inv(&["image", "get", "alpine"], ResponseShape::Array),
            Extract::field("0.analysis_status"),
            "analyzed",
        )
        .every(PollTimeout::Forever, Duration::from_secs(5));
        let outcome = runner.run(
            Check::positive("evaluate_check", inv(&["evaluate", "check", "alpine"], ResponseShape::Array))
                .expect(Extract::NonEmpty, "ok")
                .gated_on(gate),
        );
        assert_eq!(outcome, CheckOutcome::Recorded(Bucket::PositivePass));
        // forever gates and the check itself run under the invoker's own timeout only
        assert!(tool.limits().iter().all(Option::is_none));
    }

    #[test]
    fn unexpected_error_covers_unreadable_successes() {
        let check = Check::positive("account_get", inv(&["account", "get", "acme"], ResponseShape::Object))
            .expect_field("state", "enabled")
            .tolerate(ExpectedFailure::new("enabled", "still enabled").httpcode(409));
        let answer = |outcome| InvocationResult {
            outcome,
            exit_code: Some(0),
            stdout: Vec::new(),
            stderr: Vec::new(),
            elapsed: Duration::ZERO,
        };

        let fine = answer(Outcome::Success(Payload::Object(
            json!({"state": "disabled"}).as_object().unwrap().clone(),
        )));
        assert_eq!(unexpected_error(&check, &fine), None);

        let missing = answer(Outcome::Success(Payload::Object(
            json!({"name": "acme"}).as_object().unwrap().clone(),
        )));
        let reason = unexpected_error(&check, &missing).unwrap();
        assert!(reason.contains("state"), "{}", reason);

        let declared = answer(Outcome::StructuredFailure(ToolError::from_body(
            json!({"httpcode": 409, "message": "conflict"}),
        )));
        assert_eq!(unexpected_error(&check, &declared), None);

        let undeclared = answer(Outcome::StructuredFailure(ToolError::from_body(
            json!({"httpcode": 500, "message": "boom"}),
        )));
        assert!(unexpected_error(&check, &undeclared).unwrap().contains("boom"));

        let crashed = answer(Outcome::TransportFailure(TransportError::Unstructured { code: Some(2) }));
        assert!(unexpected_error(&check, &crashed).is_some());
    }

    #[test]
    fn failures_do_not_stop_later_checks() {
        let tool = ScriptedInvoker::new().json("system status", json!({"service_states": []}));
        let ledger = Ledger::new();
        let runner = Runner::new(&tool, &ledger, Poller::new(FakeClock::new()));

        runner.run(Check::positive("repo_add", inv(&["repo", "add", "x"], ResponseShape::Array)));
        runner.run(Check::negative("repo_get", inv(&["repo", "get", "x"], ResponseShape::Array)));
        runner.run(Check::positive("system_status", inv(&["system", "status"], ResponseShape::Object)));

        let summary = ledger.summary();
        assert_eq!(summary.counts.positive_fail, 1);
        assert_eq!(summary.counts.negative_fail, 1);
        assert_eq!(summary.counts.positive_pass, 1);
        assert_eq!(ledger.exit_code(), 1);
    }

    #[test]
    fn query_surfaces_rejections_as_errors() {
        let tool = ScriptedInvoker::new().reject("system feeds list", json!("Unauthorized"));
        let ledger = Ledger::new();
        let runner = Runner::new(&tool, &ledger, Poller::new(FakeClock::new()));

        let err = runner
            .query("feeds", &inv(&["system", "feeds", "list"], ResponseShape::Array))
            .unwrap_err();
        assert!(matches!(err, CallError::Rejected(_)));
        assert_eq!(ledger.total(), 0);
    }
}
