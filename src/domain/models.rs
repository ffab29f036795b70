use crate::domain::constants::SUMMARY_RULE;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct JsonOut<T: Serialize> {
    pub ok: bool,
    pub data: T,
}

#[derive(Serialize)]
pub struct JsonErr {
    pub ok: bool,
    pub error: ErrorBody,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Whether a check is expected to succeed or expected to be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Positive,
    Negative,
}

impl Polarity {
    pub fn as_str(self) -> &'static str {
        match self {
            Polarity::Positive => "positive",
            Polarity::Negative => "negative",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    PositivePass,
    PositiveFail,
    NegativePass,
    NegativeFail,
}

impl Bucket {
    /// Summary order.
    pub const ALL: [Bucket; 4] = [
        Bucket::PositivePass,
        Bucket::PositiveFail,
        Bucket::NegativePass,
        Bucket::NegativeFail,
    ];

    pub fn of(polarity: Polarity, passed: bool) -> Self {
        match (polarity, passed) {
            (Polarity::Positive, true) => Bucket::PositivePass,
            (Polarity::Positive, false) => Bucket::PositiveFail,
            (Polarity::Negative, true) => Bucket::NegativePass,
            (Polarity::Negative, false) => Bucket::NegativeFail,
        }
    }

    pub fn polarity(self) -> Polarity {
        match self {
            Bucket::PositivePass | Bucket::PositiveFail => Polarity::Positive,
            Bucket::NegativePass | Bucket::NegativeFail => Polarity::Negative,
        }
    }

    pub fn passed(self) -> bool {
        matches!(self, Bucket::PositivePass | Bucket::NegativePass)
    }

    pub fn heading(self) -> &'static str {
        match self {
            Bucket::PositivePass => "Positive Tests Passed",
            Bucket::PositiveFail => "Positive Tests Failed",
            Bucket::NegativePass => "Negative Tests Passed",
            Bucket::NegativeFail => "Negative Tests Failed",
        }
    }
}

/// One classified check. Immutable once built; filed into exactly one bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CheckRecord {
    pub action: String,
    pub polarity: Polarity,
    pub bucket: Bucket,
    pub message: String,
}

impl CheckRecord {
    pub fn line(&self) -> String {
        format!("{} - {}", self.action, self.message)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SummaryCounts {
    pub positive_pass: usize,
    pub positive_fail: usize,
    pub negative_pass: usize,
    pub negative_fail: usize,
    pub skipped: usize,
}

/// Final tally of a run. Every list is in execution order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub positive_pass: Vec<String>,
    pub positive_fail: Vec<String>,
    pub negative_pass: Vec<String>,
    pub negative_fail: Vec<String>,
    pub skipped: Vec<String>,
    pub counts: SummaryCounts,
}

impl Summary {
    pub fn bucket(&self, bucket: Bucket) -> &[String] {
        match bucket {
            Bucket::PositivePass => &self.positive_pass,
            Bucket::PositiveFail => &self.positive_fail,
            Bucket::NegativePass => &self.negative_pass,
            Bucket::NegativeFail => &self.negative_fail,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.counts.positive_fail > 0 || self.counts.negative_fail > 0
    }

    /// Text form: every non-empty bucket in insertion order, then the counts.
    pub fn render_lines(&self) -> Vec<String> {
        let mut lines = vec![SUMMARY_RULE.to_string(), "Test Summary".to_string()];
        for bucket in Bucket::ALL {
            let entries = self.bucket(bucket);
            if entries.is_empty() {
                continue;
            }
            lines.push(bucket.heading().to_string());
            lines.extend(entries.iter().map(|e| format!("\t{}", e)));
        }
        if !self.skipped.is_empty() {
            lines.push("Checks Skipped".to_string());
            lines.extend(self.skipped.iter().map(|e| format!("\t{}", e)));
        }
        lines.push(format!(
            "{} total positive tests passed",
            self.counts.positive_pass
        ));
        lines.push(format!(
            "{} total positive tests failed",
            self.counts.positive_fail
        ));
        lines.push(format!(
            "{} total negative tests passed",
            self.counts.negative_pass
        ));
        lines.push(format!(
            "{} total negative tests failed",
            self.counts.negative_fail
        ));
        lines.push(format!("{} checks skipped", self.counts.skipped));
        lines.push(SUMMARY_RULE.to_string());
        lines
    }

    pub fn render(&self) -> String {
        let mut out = self.render_lines().join("\n");
        out.push('\n');
        out
    }
}

fn default_command_prefix() -> String {
    "khulnasoft-cli --json".to_string()
}

fn default_tool_timeout() -> u64 {
    300
}

fn default_local_url() -> String {
    "http://localhost:8228/v1".to_string()
}

fn default_ci_url() -> String {
    "http://engine-api:8228/v1".to_string()
}

fn default_ci_marker() -> String {
    "CLI".to_string()
}

fn default_admin_user() -> String {
    "admin".to_string()
}

fn default_admin_password() -> String {
    "foobar".to_string()
}

fn default_test_images() -> Vec<String> {
    vec![
        "docker.io/alpine:latest".to_string(),
        "docker.io/debian:stable".to_string(),
    ]
}

fn default_repositories() -> Vec<String> {
    vec!["docker.io/alpine".to_string()]
}

fn default_registries() -> Vec<String> {
    vec!["docker.io".to_string()]
}

fn default_metadata_types() -> Vec<String> {
    vec![
        "manifest".to_string(),
        "docker_history".to_string(),
        "dockerfile".to_string(),
    ]
}

fn default_vulnerability_types() -> Vec<String> {
    vec!["os".to_string(), "non-os".to_string(), "all".to_string()]
}

fn default_system_timeout() -> i64 {
    300
}

fn default_system_interval() -> u64 {
    10
}

fn default_image_timeout() -> i64 {
    600
}

fn default_image_interval() -> u64 {
    5
}

fn default_log_file() -> String {
    "cli_driver.log".to_string()
}

/// `cli-driver.toml`. Every field is defaulted so an empty file is valid.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DriverConfig {
    #[serde(default)]
    pub tool: ToolSection,
    #[serde(default)]
    pub service: ServiceSection,
    #[serde(default)]
    pub credentials: CredentialsSection,
    #[serde(default)]
    pub fixtures: FixtureSection,
    #[serde(default)]
    pub wait: WaitSection,
    #[serde(default)]
    pub log: LogSection,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ToolSection {
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    #[serde(default)]
    pub ci_command_prefix: String,
    /// Per-call limit in seconds; 0 disables it.
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,
}

impl Default for ToolSection {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            ci_command_prefix: String::new(),
            timeout_secs: default_tool_timeout(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServiceSection {
    #[serde(default = "default_local_url")]
    pub local_url: String,
    #[serde(default = "default_ci_url")]
    pub ci_url: String,
    #[serde(default = "default_ci_marker")]
    pub ci_marker: String,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            local_url: default_local_url(),
            ci_url: default_ci_url(),
            ci_marker: default_ci_marker(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CredentialsSection {
    #[serde(default = "default_admin_user")]
    pub admin_user: String,
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
}

impl Default for CredentialsSection {
    fn default() -> Self {
        Self {
            admin_user: default_admin_user(),
            admin_password: default_admin_password(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct FixtureSection {
    #[serde(default = "default_test_images")]
    pub test_images: Vec<String>,
    #[serde(default)]
    pub malware_images: Vec<String>,
    #[serde(default)]
    pub clean_images: Vec<String>,
    #[serde(default = "default_repositories")]
    pub repositories: Vec<String>,
    #[serde(default = "default_registries")]
    pub registries: Vec<String>,
    #[serde(default = "default_metadata_types")]
    pub metadata_types: Vec<String>,
    #[serde(default = "default_vulnerability_types")]
    pub vulnerability_types: Vec<String>,
}

impl Default for FixtureSection {
    fn default() -> Self {
        Self {
            test_images: default_test_images(),
            malware_images: Vec::new(),
            clean_images: Vec::new(),
            repositories: default_repositories(),
            registries: default_registries(),
            metadata_types: default_metadata_types(),
            vulnerability_types: default_vulnerability_types(),
        }
    }
}

/// Poll settings. Negative timeouts wait forever, zero makes a single attempt.
#[derive(Clone, Debug, Deserialize)]
pub struct WaitSection {
    #[serde(default = "default_system_timeout")]
    pub system_timeout_secs: i64,
    #[serde(default = "default_system_interval")]
    pub system_interval_secs: u64,
    #[serde(default = "default_image_timeout")]
    pub image_timeout_secs: i64,
    #[serde(default = "default_image_interval")]
    pub image_interval_secs: u64,
}

impl Default for WaitSection {
    fn default() -> Self {
        Self {
            system_timeout_secs: default_system_timeout(),
            system_interval_secs: default_system_interval(),
            image_timeout_secs: default_image_timeout(),
            image_interval_secs: default_image_interval(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct LogSection {
    #[serde(default = "default_log_file")]
    pub file: String,
    #[serde(default)]
    pub dump_responses: bool,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            dump_responses: false,
        }
    }
}
