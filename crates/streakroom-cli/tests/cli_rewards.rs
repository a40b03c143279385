//! CLI E2E tests.
//!
//! Each test runs the built binary against its own data directory and
//! checks the JSON envelope on stdout together with the exit code.

use std::path::Path;
use std::process::Command;

use serde_json::Value;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(data_dir: &Path, user: Option<&str>, args: &[&str]) -> (String, String, i32) {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_streakroom-cli"));
    cmd.env("STREAKROOM_DATA_DIR", data_dir)
        .env_remove("STREAKROOM_USER")
        .env_remove("RUST_LOG");
    if let Some(user) = user {
        cmd.args(["--user", user]);
    }
    let output = cmd.args(args).output().expect("failed to run streakroom-cli");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.code().unwrap_or(-1))
}

fn envelope(stdout: &str) -> Value {
    serde_json::from_str(stdout).expect("stdout is not a JSON envelope")
}

#[test]
fn claim_requires_a_user() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), None, &["rewards", "claim"]);
    assert_eq!(code, 3);
    let body = envelope(&stdout);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Unauthorized");
}

#[test]
fn claim_once_per_day() {
    let dir = tempfile::tempdir().unwrap();

    let (stdout, stderr, code) = run_cli(dir.path(), Some("alice"), &["rewards", "claim"]);
    assert_eq!(code, 0, "stderr: {stderr}");
    let body = envelope(&stdout);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["current_day"], 1);
    assert_eq!(body["data"]["reward_token"], "ZOO");
    assert!(body.get("error").is_none());

    let (stdout, _, code) = run_cli(dir.path(), Some("alice"), &["rewards", "claim"]);
    assert_eq!(code, 2);
    assert_eq!(envelope(&stdout)["error"], "Daily reward already claimed today");

    let (stdout, _, code) = run_cli(dir.path(), Some("alice"), &["rewards", "status"]);
    assert_eq!(code, 0);
    let status = envelope(&stdout);
    assert_eq!(status["data"]["claimed_today"], true);
    assert_eq!(status["data"]["days"].as_array().map(Vec::len), Some(7));
}

#[test]
fn history_lists_the_claim() {
    let dir = tempfile::tempdir().unwrap();
    run_cli(dir.path(), Some("bob"), &["rewards", "claim"]);

    let (stdout, _, code) = run_cli(dir.path(), Some("bob"), &["history"]);
    assert_eq!(code, 0);
    let body = envelope(&stdout);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["type"], "daily_reward");

    let (_, _, code) = run_cli(dir.path(), Some("bob"), &["history", "--page", "0"]);
    assert_eq!(code, 2);
}

#[test]
fn task_and_referral_flow() {
    let dir = tempfile::tempdir().unwrap();

    let (stdout, stderr, code) = run_cli(
        dir.path(),
        None,
        &["task", "add", "Follow us", "--reward", "5", "--token", "kaia", "--type", "social"],
    );
    assert_eq!(code, 0, "stderr: {stderr}");
    let task_id = envelope(&stdout)["data"]["id"].as_str().unwrap().to_string();

    let (_, _, code) = run_cli(dir.path(), Some("carol"), &["task", "complete", &task_id]);
    assert_eq!(code, 0);
    let (_, _, code) = run_cli(dir.path(), Some("carol"), &["task", "complete", &task_id]);
    assert_eq!(code, 2);

    let (stdout, _, _) = run_cli(dir.path(), Some("carol"), &["profile", "show"]);
    let profile = envelope(&stdout);
    assert_eq!(profile["data"]["profile"]["total_tasks_completed"], 1);
    let code_str = profile["data"]["profile"]["referral_code"]
        .as_str()
        .unwrap()
        .to_string();

    let (stdout, _, code) = run_cli(dir.path(), Some("dan"), &["referral", "apply", &code_str]);
    assert_eq!(code, 0);
    assert_eq!(envelope(&stdout)["data"]["referrer_id"], "carol");

    let (_, _, code) = run_cli(dir.path(), Some("carol"), &["referral", "apply", &code_str]);
    assert_eq!(code, 2);
}

#[test]
fn config_roundtrip() {
    let dir = tempfile::tempdir().unwrap();

    let (_, _, code) = run_cli(dir.path(), None, &["config", "set", "streak.cycle_policy", "wrap"]);
    assert_eq!(code, 0);
    let (stdout, _, code) = run_cli(dir.path(), None, &["config", "get", "streak.cycle_policy"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "wrap");

    let (_, stderr, code) =
        run_cli(dir.path(), None, &["config", "set", "streak.utc_offset_minutes", "5000"]);
    assert_eq!(code, 1);
    assert!(stderr.starts_with("error:"));

    let (stdout, _, code) = run_cli(dir.path(), None, &["tiers"]);
    assert_eq!(code, 0);
    let tiers = envelope(&stdout);
    assert_eq!(tiers["data"][6]["amount"], 10.0);
}

#[test]
fn profile_update_and_overview() {
    let dir = tempfile::tempdir().unwrap();
    run_cli(dir.path(), Some("erin"), &["rewards", "claim"]);

    let (stdout, stderr, code) = run_cli(
        dir.path(),
        Some("erin"),
        &["profile", "update", "--name", "Erin", "--avatar-url", "https://img.example/e.png"],
    );
    assert_eq!(code, 0, "stderr: {stderr}");
    assert_eq!(envelope(&stdout)["data"]["avatar_url"], "https://img.example/e.png");

    let (stdout, _, code) = run_cli(dir.path(), Some("erin"), &["profile", "show"]);
    assert_eq!(code, 0);
    let overview = envelope(&stdout);
    assert_eq!(overview["data"]["profile"]["display_name"], "Erin");
    assert_eq!(overview["data"]["streak"]["current_day"], 1);
    assert_eq!(overview["data"]["achievements"][0]["achievement_type"], "login_streak");
    assert_eq!(overview["data"]["achievements"][0]["current_progress"], 1);

    let (_, _, code) = run_cli(
        dir.path(),
        Some("erin"),
        &["profile", "update", "--avatar-url", "not-a-url"],
    );
    assert_eq!(code, 2);
}

#[test]
fn tiers_fall_back_to_defaults_on_broken_config() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.toml"), "[streak\nnot toml").unwrap();

    let (stdout, _, code) = run_cli(dir.path(), None, &["tiers"]);
    assert_eq!(code, 0);
    assert_eq!(envelope(&stdout)["data"][0]["amount"], 1.0);
}
