use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn conductor_help_command_succeeds() {
    let mut cmd = Command::cargo_bin("conductor").expect("conductor binary should build");
    cmd.arg("--help").env("NO_COLOR", "1");
    cmd.assert().success().stdout(contains("Streaming tool-calling orchestrator"));
}

#[test]
fn conductor_without_a_prompt_fails_with_usage() {
    let mut cmd = Command::cargo_bin("conductor").expect("conductor binary should build");
    cmd.env("NO_COLOR", "1");
    cmd.assert().failure().stderr(contains("Usage"));
}
