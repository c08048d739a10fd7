use assert_cmd::Command;

fn innsight(home: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("innsight").expect("binary");
    cmd.env("HOME", home.path());
    cmd
}

#[test]
fn help_describes_the_console() {
    let home = tempfile::tempdir().expect("tempdir");
    let output = innsight(&home).arg("--help").output().expect("run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("monitoring console"));
    assert!(stdout.contains("--login"));
    assert!(stdout.contains("--status-only"));
}

#[test]
fn running_without_a_token_reports_not_logged_in() {
    let home = tempfile::tempdir().expect("tempdir");
    let output = innsight(&home).output().expect("run");
    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("not logged in"));
}

#[test]
fn login_requires_email_and_password_flags() {
    let home = tempfile::tempdir().expect("tempdir");
    let output = innsight(&home).arg("--login").output().expect("run");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--email"));
}

#[test]
fn login_rejects_a_malformed_email_before_any_request() {
    let home = tempfile::tempdir().expect("tempdir");
    let output = innsight(&home)
        .args(["--login", "--email", "not-an-email", "--password", "hunter2"])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid email"));
}

#[test]
fn logout_succeeds_even_without_a_stored_token() {
    let home = tempfile::tempdir().expect("tempdir");
    let output = innsight(&home).arg("--logout").output().expect("run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("signed out"));
}
