use assert_cmd::cargo::cargo_bin_cmd;

#[test]
fn help_lists_subcommands_and_global_flags() {
    let mut cmd = cargo_bin_cmd!("cerveau");
    cmd.arg("--help");
    let out = cmd.assert().success();
    let stdout = String::from_utf8(out.get_output().stdout.clone()).expect("utf8");

    for needle in ["dash", "sys", "gh", "--root", "--variant", "--config"] {
        assert!(stdout.contains(needle), "missing {needle} in help");
    }
}

#[test]
fn sys_report_prints_json() {
    let home = tempfile::tempdir().expect("home");
    let mut cmd = cargo_bin_cmd!("cerveau");
    cmd.env("HOME", home.path()).arg("sys").arg("report");
    let out = cmd.assert().success();
    let report: serde_json::Value =
        serde_json::from_slice(&out.get_output().stdout).expect("report json");
    assert!(report["cpu"]["cores_logical"].as_u64().is_some());
    assert!(report["disk_root"]["status"].is_string());
}

#[test]
fn dashboard_on_empty_root_quits_from_piped_input() {
    let home = tempfile::tempdir().expect("home");
    let root = tempfile::tempdir().expect("root");
    let mut cmd = cargo_bin_cmd!("cerveau");
    cmd.env("HOME", home.path())
        .arg("--root")
        .arg(root.path())
        .write_stdin("q\n");
    let out = cmd.assert().success();
    let stdout = String::from_utf8(out.get_output().stdout.clone()).expect("utf8");
    assert!(stdout.contains("CERVEAU DASHBOARD"));
    assert!(stdout.contains("No items found in"));
    assert!(home.path().join(".cache/cerveau/logs/run.jsonl").exists());
}

#[test]
fn dashboard_quits_on_eof() {
    let home = tempfile::tempdir().expect("home");
    let root = tempfile::tempdir().expect("root");
    let mut cmd = cargo_bin_cmd!("cerveau");
    cmd.env("HOME", home.path())
        .arg("dash")
        .arg("--root")
        .arg(root.path())
        .write_stdin("");
    cmd.assert().success();
}

#[test]
fn missing_explicit_config_exits_nonzero() {
    let home = tempfile::tempdir().expect("home");
    let mut cmd = cargo_bin_cmd!("cerveau");
    cmd.env("HOME", home.path())
        .arg("--config")
        .arg(home.path().join("missing.toml"))
        .arg("sys")
        .arg("report");
    let out = cmd.assert().failure();
    let stderr = String::from_utf8(out.get_output().stderr.clone()).expect("utf8");
    assert!(stderr.starts_with("cerveau:"));
}

#[test]
fn invalid_config_value_exits_nonzero() {
    let home = tempfile::tempdir().expect("home");
    let config = home.path().join("cerveau.toml");
    std::fs::write(&config, "[cache]\nttl_seconds = 0\n").expect("write config");
    let mut cmd = cargo_bin_cmd!("cerveau");
    cmd.env("HOME", home.path())
        .arg("--config")
        .arg(&config)
        .arg("sys")
        .arg("report");
    let out = cmd.assert().failure();
    let stderr = String::from_utf8(out.get_output().stderr.clone()).expect("utf8");
    assert!(stderr.contains("ttl_seconds"));
}

#[test]
fn gh_without_token_names_the_variable() {
    let home = tempfile::tempdir().expect("home");
    let mut cmd = cargo_bin_cmd!("cerveau");
    cmd.env("HOME", home.path())
        .env_remove("GITHUB_TOKEN")
        .args(["gh", "repos", "--owner", "octocat"]);
    let out = cmd.assert().failure();
    let stderr = String::from_utf8(out.get_output().stderr.clone()).expect("utf8");
    assert!(stderr.contains("GITHUB_TOKEN"));
}
