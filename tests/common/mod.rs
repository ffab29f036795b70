#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Answers the calls the system and repo groups make; anything else is a 404.
pub const HEALTHY_TOOL: &str = r#"
case "$*" in
  "system status") echo '{"service_states": [{"servicename": "catalog", "service_detail": {"up": true}}, {"servicename": "policy_engine", "service_detail": "up"}]}' ;;
  "system errorcodes") echo '[{"name": "UNKNOWN"}, {"name": "REGISTRY_PERMISSION_ERROR"}]' ;;
  "repo add "*|"repo get "*|"repo watch "*) echo '[{"active": true}]' ;;
  "repo unwatch "*) echo '[{"active": false}]' ;;
  "repo list") echo '[{"repository": "docker.io/alpine"}]' ;;
  "repo del "*) echo 'true' ;;
  *) echo '{"httpcode": 404, "message": "not scripted"}'; exit 1 ;;
esac
"#;

/// Crashes on every call without structured output.
pub const BROKEN_TOOL: &str = r#"
echo "Traceback (most recent call last):" >&2
exit 1
"#;

/// Hangs on every call.
pub const HUNG_TOOL: &str = r#"
sleep 30
"#;

pub struct TestEnv {
    _tmp: TempDir,
    pub dir: PathBuf,
    pub config: PathBuf,
    pub log: PathBuf,
}

impl TestEnv {
    /// Writes `body` as the fake tool (after the connection flags are shifted off) and a config
    /// pointing at it with no service waits.
    pub fn with_tool(body: &str) -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let dir = tmp.path().to_path_buf();

        let tool = dir.join("fake-cli");
        // --json --u <user> --p <password> --url <url>
        fs::write(&tool, format!("#!/bin/sh\nshift 7\n{}", body)).expect("write fake tool");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tool, fs::Permissions::from_mode(0o755))
                .expect("make fake tool executable");
        }

        let log = dir.join("run.log");
        let config = dir.join("cli-driver.toml");
        fs::write(
            &config,
            format!(
                r#"[tool]
command_prefix = "{} --json"
timeout_secs = 10

[wait]
system_timeout_secs = 0
image_timeout_secs = 0

[fixtures]
repositories = ["docker.io/alpine"]

[log]
file = "{}"
"#,
                tool.display(),
                log.display()
            ),
        )
        .expect("write config");

        Self {
            _tmp: tmp,
            dir,
            config,
            log,
        }
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = self.cmd_without_config();
        cmd.arg("--config").arg(&self.config);
        cmd
    }

    /// Leaves config discovery to the binary; the working directory holds `cli-driver.toml`.
    pub fn cmd_without_config(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("cli-driver");
        cmd.current_dir(&self.dir)
            .env_remove("CLI_DRIVER_CONFIG")
            .env_remove("REGISTRY_URL")
            .env_remove("REGISTRY_USER")
            .env_remove("REGISTRY_TOKEN")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Runs with `--json` and returns the envelope, whatever the exit code.
    pub fn run_json(&self, args: &[&str], code: i32) -> Value {
        let out = self
            .cmd()
            .arg("--json")
            .args(args)
            .assert()
            .code(code)
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).expect("valid json output")
    }

    pub fn run_log(&self) -> String {
        fs::read_to_string(&self.log).unwrap_or_default()
    }
}
