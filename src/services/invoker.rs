use crate::services::payload::Payload;
use serde_json::Value;
use std::fmt;
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// What a successful call is expected to print.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseShape {
    Object,
    Array,
    /// A bare token such as `true\n`.
    Scalar,
    None,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

/// Connection prefix shared by every call: `<prefix> --u <user> --p <password> --url <url>`.
#[derive(Clone, Debug)]
pub struct ToolContext {
    prefix: Vec<String>,
    credentials: Credentials,
    api_url: String,
}

impl ToolContext {
    pub fn new(command_prefix: &str, credentials: Credentials, api_url: &str) -> Self {
        Self {
            prefix: command_prefix.split_whitespace().map(str::to_string).collect(),
            credentials,
            api_url: api_url.to_string(),
        }
    }

    /// Same tool and service, different identity.
    pub fn as_user(&self, credentials: Credentials) -> Self {
        Self {
            credentials,
            ..self.clone()
        }
    }

    pub fn invocation<I, S>(&self, args: I, shape: ResponseShape) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut prefix = self.prefix.iter();
        let program = prefix.next().cloned().unwrap_or_default();
        let mut argv: Vec<String> = prefix.cloned().collect();
        argv.extend([
            "--u".to_string(),
            self.credentials.user.clone(),
            "--p".to_string(),
            self.credentials.password.clone(),
            "--url".to_string(),
            self.api_url.clone(),
        ]);
        argv.extend(args.into_iter().map(Into::into));
        Invocation {
            program,
            args: argv,
            shape,
            secrets: vec![self.credentials.password.clone()],
        }
    }
}

/// A fully resolved command line. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    shape: ResponseShape,
    secrets: Vec<String>,
}

impl Invocation {
    #[cfg(test)]
    pub fn new<I, S>(program: &str, args: I, shape: ResponseShape) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            shape,
            secrets: Vec::new(),
        }
    }

    /// Hide `secret` wherever it appears as an argument in the display form.
    pub fn masking(mut self, secret: &str) -> Self {
        self.secrets.push(secret.to_string());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn shape(&self) -> ResponseShape {
        self.shape
    }
}

impl fmt::Display for Invocation {
    /// Command line for logs, password masked.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            let hidden = self.secrets.iter().any(|s| !s.is_empty() && s == arg);
            let shown = if hidden { "****" } else { arg.as_str() };
            write!(f, " {}", shown)?;
        }
        Ok(())
    }
}

/// Decoded error body of a rejected call, e.g. `{"httpcode": 403, "message": "..."}`.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolError {
    pub httpcode: Option<u16>,
    pub message: Option<String>,
    pub body: Value,
}

impl ToolError {
    pub fn from_body(body: Value) -> Self {
        let (httpcode, message) = match &body {
            Value::String(s) => (None, Some(s.clone())),
            Value::Object(m) => (
                m.get("httpcode")
                    .and_then(Value::as_u64)
                    .and_then(|c| u16::try_from(c).ok()),
                m.get("message").and_then(Value::as_str).map(str::to_string),
            ),
            _ => (None, None),
        };
        Self {
            httpcode,
            message,
            body,
        }
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.httpcode, &self.message) {
            (Some(code), Some(msg)) => write!(f, "httpcode {}: {}", code, msg),
            (None, Some(msg)) => f.write_str(msg),
            (Some(code), None) => write!(f, "httpcode {}", code),
            (None, None) => write!(f, "{}", self.body),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("could not start `{program}`: {reason}")]
    Spawn { program: String, reason: String },
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("exit code {code:?} with unstructured output")]
    Unstructured { code: Option<i32> },
    #[error("could not decode {shape:?} response: {reason}")]
    Decode { shape: ResponseShape, reason: String },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Success(Payload),
    /// The tool ran and rejected the call with a decodable body.
    StructuredFailure(ToolError),
    TransportFailure(TransportError),
}

#[derive(Clone, Debug)]
pub struct InvocationResult {
    pub outcome: Outcome,
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub elapsed: Duration,
}

impl InvocationResult {
    pub fn into_payload(self) -> Result<Payload, CallError> {
        match self.outcome {
            Outcome::Success(p) => Ok(p),
            Outcome::StructuredFailure(e) => Err(CallError::Rejected(e)),
            Outcome::TransportFailure(e) => Err(CallError::Transport(e)),
        }
    }

    /// One-line description of a failed call for check messages.
    pub fn diagnostic(&self) -> String {
        match &self.outcome {
            Outcome::Success(_) => "call succeeded".to_string(),
            Outcome::StructuredFailure(e) => format!("tool rejected the call ({})", e),
            Outcome::TransportFailure(e) => {
                let stderr = String::from_utf8_lossy(&self.stderr);
                let stderr = stderr.trim();
                if stderr.is_empty() {
                    e.to_string()
                } else {
                    format!("{} (stderr: {})", e, truncate(stderr, 200))
                }
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CallError {
    #[error("tool rejected the call: {0}")]
    Rejected(ToolError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Runs one external call. Never fails past this boundary; failures live in the result.
///
/// `limit` caps this one call on top of any timeout the invoker already has.
pub trait Invoke: Sync {
    fn invoke(&self, invocation: &Invocation, limit: Option<Duration>) -> InvocationResult;
}

/// Invokes the real tool as a child process.
#[derive(Clone, Debug, Default)]
pub struct ProcessInvoker {
    timeout: Option<Duration>,
}

impl ProcessInvoker {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    fn effective_timeout(&self, limit: Option<Duration>) -> Option<Duration> {
        match (self.timeout, limit) {
            (Some(own), Some(limit)) => Some(own.min(limit)),
            (own, limit) => own.or(limit),
        }
    }

    fn read_all(mut reader: impl Read) -> Vec<u8> {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    }
}

impl Invoke for ProcessInvoker {
    fn invoke(&self, invocation: &Invocation, limit: Option<Duration>) -> InvocationResult {
        let timeout = self.effective_timeout(limit);
        let start = Instant::now();
        let spawned = Command::new(invocation.program())
            .args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let mut child = match spawned {
            Ok(c) => c,
            Err(e) => {
                return InvocationResult {
                    outcome: Outcome::TransportFailure(TransportError::Spawn {
                        program: invocation.program().to_string(),
                        reason: e.to_string(),
                    }),
                    exit_code: None,
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                    elapsed: start.elapsed(),
                }
            }
        };

        let stdout_handle = child
            .stdout
            .take()
            .map(|out| thread::spawn(move || Self::read_all(out)));
        let stderr_handle = child
            .stderr
            .take()
            .map(|err| thread::spawn(move || Self::read_all(err)));

        let mut timed_out = false;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) => {}
                Err(_) => break child.wait().ok(),
            }
            if let Some(limit) = timeout {
                if start.elapsed() >= limit {
                    timed_out = true;
                    let _ = child.kill();
                    break child.wait().ok();
                }
            }
            thread::sleep(Duration::from_millis(10));
        };

        // grandchildren of a killed tool can hold the pipes open; leave their readers behind
        let collect = |h: Option<thread::JoinHandle<Vec<u8>>>| match h {
            Some(h) if !timed_out => h.join().unwrap_or_default(),
            _ => Vec::new(),
        };
        let stdout = collect(stdout_handle);
        let stderr = collect(stderr_handle);
        let exit_code = status.and_then(|s| s.code());
        let succeeded = status.map(|s| s.success()).unwrap_or(false);

        let outcome = match (timed_out, timeout) {
            (true, Some(limit)) => Outcome::TransportFailure(TransportError::TimedOut(limit)),
            _ => interpret(invocation.shape(), succeeded, exit_code, &stdout, &stderr),
        };

        InvocationResult {
            outcome,
            exit_code,
            stdout,
            stderr,
            elapsed: start.elapsed(),
        }
    }
}

/// Turns captured process output into an outcome.
pub fn interpret(
    shape: ResponseShape,
    succeeded: bool,
    exit_code: Option<i32>,
    stdout: &[u8],
    stderr: &[u8],
) -> Outcome {
    if succeeded {
        return match decode_payload(shape, stdout) {
            Ok(p) => Outcome::Success(p),
            Err(e) => Outcome::TransportFailure(e),
        };
    }
    // Error bodies are JSON by tool convention; some builds print them on stderr.
    match parse_json(stdout).or_else(|| parse_json(stderr)) {
        Some(body) => Outcome::StructuredFailure(ToolError::from_body(body)),
        None => Outcome::TransportFailure(TransportError::Unstructured { code: exit_code }),
    }
}

fn parse_json(bytes: &[u8]) -> Option<Value> {
    let text = std::str::from_utf8(bytes).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    serde_json::from_str(text).ok()
}

pub fn decode_payload(shape: ResponseShape, stdout: &[u8]) -> Result<Payload, TransportError> {
    let decode_err = |reason: String| TransportError::Decode { shape, reason };
    match shape {
        ResponseShape::None => Ok(Payload::Empty),
        ResponseShape::Scalar => {
            let text = std::str::from_utf8(stdout)
                .map_err(|e| decode_err(e.to_string()))?
                .trim();
            if text.is_empty() {
                return Err(decode_err("empty output".to_string()));
            }
            if let Some(b) = parse_bool_token(text) {
                return Ok(Payload::Scalar(Value::Bool(b)));
            }
            Ok(Payload::Scalar(
                serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())),
            ))
        }
        ResponseShape::Object | ResponseShape::Array => {
            let value: Value =
                serde_json::from_slice(stdout).map_err(|e| decode_err(e.to_string()))?;
            match (shape, value) {
                (ResponseShape::Object, Value::Object(m)) => Ok(Payload::Object(m)),
                (ResponseShape::Array, Value::Array(a)) => Ok(Payload::Array(a)),
                (_, other) => Err(decode_err(format!("got {}", json_kind(&other)))),
            }
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Boolean-like tokens the tool prints for delete-style calls.
pub fn parse_bool_token(token: &str) -> Option<bool> {
    match token.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Some(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}
