// cli_flow.rs — Drive the folio binary against a throwaway origin.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "Seed")
        .env("GIT_AUTHOR_EMAIL", "seed@example.com")
        .env("GIT_COMMITTER_NAME", "Seed")
        .env("GIT_COMMITTER_EMAIL", "seed@example.com")
        .status()
        .unwrap();
    assert!(status.success(), "git {:?} failed", args);
}

/// Bare `origin.git` with one page on `master`.
fn make_origin(root: &Path) {
    let seed = root.join("seed");
    fs::create_dir_all(&seed).unwrap();
    git(&seed, &["init", "-q"]);
    git(&seed, &["symbolic-ref", "HEAD", "refs/heads/master"]);
    fs::write(seed.join("index.md"), "---\ntitle: Home\n---\nWelcome\n").unwrap();
    git(&seed, &["add", "index.md"]);
    git(&seed, &["commit", "-q", "-m", "Initial commit"]);
    git(root, &["clone", "-q", "--bare", "seed", "origin.git"]);
}

fn folio(root: &Path, email: &str, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_folio"))
        .args(["--origin", "origin.git", "--work-path", "work", "--email", email])
        .args(args)
        .current_dir(root)
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn start_edit_and_abandon_from_the_command_line() {
    let dir = TempDir::new().unwrap();
    make_origin(dir.path());

    let started = folio(
        dir.path(),
        "erica@example.com",
        &["activity", "start", "Fix typo", "--beneficiary", "Mayor"],
    );
    assert!(started.status.success(), "{}", String::from_utf8_lossy(&started.stderr));
    let out = stdout(&started);
    let branch = out
        .lines()
        .find_map(|l| l.strip_prefix("Activity started: "))
        .unwrap()
        .to_string();

    let read = folio(dir.path(), "erica@example.com", &["page", "read", &branch, "index.md"]);
    assert!(read.status.success());
    assert!(stdout(&read).contains("Welcome"));
    let stderr = String::from_utf8_lossy(&read.stderr).into_owned();
    let base = stderr
        .lines()
        .find_map(|l| l.strip_prefix("base: "))
        .unwrap()
        .to_string();

    let saved = folio(
        dir.path(),
        "erica@example.com",
        &[
            "page", "save", &branch, "index.md", "--base", &base, "--set", "title=Home", "--body",
            "Fixed\n",
        ],
    );
    assert!(saved.status.success(), "{}", String::from_utf8_lossy(&saved.stderr));
    assert!(stdout(&saved).contains("Saved changes to \"index.md\""));

    let listed = folio(dir.path(), "erica@example.com", &["activity", "list"]);
    assert!(stdout(&listed).contains(&branch));
    assert!(stdout(&listed).contains("unreviewed edits"));

    // Self-approval is refused.
    let approve = folio(dir.path(), "erica@example.com", &["review", "approve", &branch]);
    assert!(!approve.status.success());

    let abandoned = folio(dir.path(), "erica@example.com", &["activity", "abandon", &branch]);
    assert!(abandoned.status.success());
    let show = folio(dir.path(), "erica@example.com", &["activity", "show", &branch]);
    assert!(stdout(&show).contains("Status: deleted"));
}

#[test]
fn empty_description_is_rejected() {
    let dir = TempDir::new().unwrap();
    make_origin(dir.path());

    let output = folio(dir.path(), "erica@example.com", &["activity", "start", "  "]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("needs a description"));
}

#[test]
fn init_writes_a_config_later_commands_pick_up() {
    let dir = TempDir::new().unwrap();
    make_origin(dir.path());

    let init = Command::new(env!("CARGO_BIN_EXE_folio"))
        .args(["--origin", "origin.git", "--work-path", "work", "--single-user", "init"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert!(init.status.success(), "{}", String::from_utf8_lossy(&init.stderr));
    let written = fs::read_to_string(dir.path().join("folio.toml")).unwrap();
    assert!(written.contains("single_user = true"));

    let listed = Command::new(env!("CARGO_BIN_EXE_folio"))
        .args(["--email", "erica@example.com", "activity", "list"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert!(listed.status.success(), "{}", String::from_utf8_lossy(&listed.stderr));
    assert!(stdout(&listed).contains("No activities in progress."));
}
