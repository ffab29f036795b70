#![cfg(unix)]

mod common;

use common::{TestEnv, BROKEN_TOOL, HEALTHY_TOOL, HUNG_TOOL};
use predicates::prelude::*;
use std::fs;

#[test]
fn system_group_passes_against_a_healthy_tool() {
    let env = TestEnv::with_tool(HEALTHY_TOOL);
    let v = env.run_json(&["system"], 0);
    assert_eq!(v["ok"], true);
    assert_eq!(v["data"]["counts"]["positive_pass"], 2);
    assert_eq!(v["data"]["counts"]["positive_fail"], 0);
    assert_eq!(v["data"]["positive_pass"][0], "system_status - 2 services found");
    assert_eq!(v["data"]["positive_pass"][1], "system_errorcodes - 2 error codes found");
}

#[test]
fn repo_group_reads_the_scalar_delete_answer() {
    let env = TestEnv::with_tool(HEALTHY_TOOL);
    let v = env.run_json(&["repo"], 0);
    let passed: Vec<&str> = v["data"]["positive_pass"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e.as_str().unwrap())
        .collect();
    assert_eq!(passed.len(), 6);
    assert!(passed[0].starts_with("repo_add - "));
    assert!(passed[5].starts_with("repo_del - "));
    assert_eq!(v["data"]["counts"]["negative_fail"], 0);
}

#[test]
fn a_crashing_tool_fails_the_run() {
    let env = TestEnv::with_tool(BROKEN_TOOL);
    let v = env.run_json(&["--skip-system-wait", "system"], 1);
    assert_eq!(v["ok"], false);
    assert_eq!(v["data"]["counts"]["positive_fail"], 2);
    assert_eq!(v["data"]["counts"]["positive_pass"], 0);
}

#[test]
fn a_hung_tool_is_recorded_as_a_failure() {
    let env = TestEnv::with_tool(HUNG_TOOL);
    let v = env.run_json(&["--skip-system-wait", "--timeout-secs", "1", "system"], 1);
    assert_eq!(v["data"]["counts"]["positive_fail"], 2);
    let first = v["data"]["positive_fail"][0].as_str().unwrap();
    assert!(first.starts_with("system_status - "), "{}", first);
    assert!(first.contains("timed out"), "{}", first);
}

#[test]
fn service_that_never_comes_up_still_runs_the_group() {
    let env = TestEnv::with_tool(
        r#"
case "$*" in
  "system status") echo '{"httpcode": 503, "message": "starting"}'; exit 1 ;;
  "repo add "*|"repo get "*|"repo watch "*) echo '[{"active": true}]' ;;
  "repo unwatch "*) echo '[{"active": false}]' ;;
  "repo list") echo '[]' ;;
  "repo del "*) echo 'true' ;;
esac
"#,
    );
    let v = env.run_json(&["repo"], 0);
    assert_eq!(v["data"]["counts"]["positive_pass"], 6);
    // the wait itself is never recorded
    assert_eq!(v["data"]["counts"]["skipped"], 0);
}

#[test]
fn registry_is_skipped_without_credentials() {
    let env = TestEnv::with_tool(HEALTHY_TOOL);
    let v = env.run_json(&["registry"], 0);
    assert_eq!(v["data"]["counts"]["skipped"], 1);
    assert_eq!(v["data"]["counts"]["positive_pass"], 0);
    let skipped = v["data"]["skipped"][0].as_str().unwrap();
    assert!(skipped.starts_with("registry - "), "{}", skipped);
    assert!(skipped.contains("REGISTRY_URL"), "{}", skipped);
}

#[test]
fn registry_token_never_reaches_the_log() {
    let env = TestEnv::with_tool(
        r#"
case "$*" in
  "system status") echo '{"service_states": []}' ;;
  "registry list") echo '[]' ;;
  "registry get "*) echo '[{"registry": "reg.example.com"}]' ;;
  "registry del "*) echo 'true' ;;
  "registry add "*) echo '[{"registry": "reg.example.com"}]' ;;
esac
"#,
    );
    env.cmd()
        .env("REGISTRY_URL", "reg.example.com")
        .env("REGISTRY_USER", "robot")
        .env("REGISTRY_TOKEN", "s3cr3t-token")
        .args(["--json", "registry"])
        .assert()
        // the second add is expected to be rejected but the fake accepts it
        .code(1)
        .stderr(predicate::str::contains("s3cr3t-token").not());
    let log = env.run_log();
    assert!(log.contains("registry_add"), "{}", log);
    assert!(!log.contains("s3cr3t-token"));
}

#[test]
fn registry_credentials_are_read_from_a_dotenv_file() {
    let env = TestEnv::with_tool(
        r#"
case "$*" in
  "registry list") echo '[]' ;;
  "registry get "*) echo '[{"registry": "reg.example.com"}]' ;;
  "registry del "*) echo 'true' ;;
  "registry add "*)
    if [ -e "$0.added" ]; then
      echo '{"httpcode": 409, "message": "registry already exists in DB: reg.example.com"}'
      exit 1
    fi
    touch "$0.added"
    echo '[{"registry": "reg.example.com"}]' ;;
esac
"#,
    );
    fs::write(
        env.dir.join(".env"),
        "REGISTRY_URL=reg.example.com\nREGISTRY_USER=robot\nREGISTRY_TOKEN=from-dotenv\n",
    )
    .unwrap();
    let v = env.run_json(&["registry"], 0);
    assert_eq!(v["data"]["counts"]["skipped"], 0);
    assert_eq!(v["data"]["counts"]["positive_pass"], 4);
    assert_eq!(v["data"]["counts"]["negative_pass"], 1);
    assert!(!env.run_log().contains("from-dotenv"));
}

#[test]
fn text_summary_lists_buckets_and_totals() {
    let env = TestEnv::with_tool(HEALTHY_TOOL);
    env.cmd()
        .arg("system")
        .assert()
        .success()
        .stdout(predicate::str::contains("Test Summary"))
        .stdout(predicate::str::contains("Positive Tests Passed"))
        .stdout(predicate::str::contains("\tsystem_status - 2 services found"))
        .stdout(predicate::str::contains("2 total positive tests passed"))
        .stdout(predicate::str::contains("0 total negative tests failed"));
}

#[test]
fn every_check_lands_in_the_run_log() {
    let env = TestEnv::with_tool(HEALTHY_TOOL);
    env.run_json(&["system"], 0);
    let log = env.run_log();
    assert!(log.contains("system_status | passed"), "{}", log);
    assert!(log.contains("system_errorcodes | passed"), "{}", log);
}

#[test]
fn config_file_is_found_in_the_working_directory() {
    let env = TestEnv::with_tool(HEALTHY_TOOL);
    let out = env
        .cmd_without_config()
        .args(["--json", "system"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v["data"]["counts"]["positive_pass"], 2);
}

#[test]
fn unreadable_config_is_a_startup_error() {
    let env = TestEnv::with_tool(HEALTHY_TOOL);
    fs::write(&env.config, "[tool\ncommand_prefix = ").unwrap();
    let v = env.run_json(&["system"], 2);
    assert_eq!(v["ok"], false);
    assert_eq!(v["error"]["code"], "config_parse");

    fs::remove_file(&env.config).unwrap();
    let v = env.run_json(&["system"], 2);
    assert_eq!(v["error"]["code"], "config_read");
}

#[test]
fn empty_command_prefix_is_rejected() {
    let env = TestEnv::with_tool(HEALTHY_TOOL);
    fs::write(&env.config, "[tool]\ncommand_prefix = \"  \"\n").unwrap();
    let v = env.run_json(&["system"], 2);
    assert_eq!(v["error"]["code"], "config_invalid");
}
