use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use assert_cmd::Command;
use tempfile::{TempDir, tempdir};

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

struct Vault {
    _tmp: TempDir,
    root: PathBuf,
    config: PathBuf,
}

impl Vault {
    fn new(extra_config: &str) -> Self {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("vault");
        write(&root.join("a.md"), "# A\n\nSee [[b]] and [B again](b.md).\n");
        write(&root.join("b.md"), "---\nstatus: draft\n---\n# B\n\nBody of b.\n");
        write(&root.join("inbox/task.md"), "# Task\n\nParent: [A](../a.md)\n");

        let config = tmp.path().join("config.toml");
        write(
            &config,
            &format!(
                "version = 1\n[profiles.default]\nvault_root = \"{}\"\n{extra_config}",
                root.display()
            ),
        );
        Self { _tmp: tmp, root, config }
    }

    fn vdx(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("vdx"));
        cmd.arg("--config").arg(&self.config);
        cmd
    }

    fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.root.join(rel)).unwrap()
    }

    fn files_in(&self, rel: &str) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.root.join(rel))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

#[test]
fn rename_updates_references() {
    let vault = Vault::new("");
    vault
        .vdx()
        .args(["rename", "b.md", "c"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rename: b.md -> c.md"))
        .stdout(predicate::str::contains("References updated: 2"));

    assert!(!vault.root.join("b.md").exists());
    assert!(vault.read("c.md").contains("Body of b."));
    assert_eq!(vault.read("a.md"), "# A\n\nSee [[c]] and [B again](c.md).\n");
}

#[test]
fn rename_without_link_updates() {
    let vault = Vault::new("");
    vault.vdx().args(["rename", "b.md", "c", "--no-links"]).assert().success();

    assert!(vault.root.join("c.md").exists());
    assert_eq!(vault.read("a.md"), "# A\n\nSee [[b]] and [B again](b.md).\n");
}

#[test]
fn rename_onto_existing_document_fails() {
    let vault = Vault::new("");
    vault
        .vdx()
        .args(["rename", "b.md", "a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    assert!(vault.root.join("b.md").exists());
}

#[test]
fn move_dry_run_changes_nothing() {
    let vault = Vault::new("");
    vault
        .vdx()
        .args(["move", "inbox/task.md", "archive", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("move: inbox/task.md -> archive/task.md"))
        .stdout(predicate::str::contains("(dry-run mode - no changes made)"));

    assert!(vault.root.join("inbox/task.md").exists());
    assert!(!vault.root.join("archive").exists());
}

#[test]
fn move_keeps_relative_links_working() {
    let vault = Vault::new("");
    vault.vdx().args(["move", "inbox/task.md", "archive/2026"]).assert().success();

    assert!(!vault.root.join("inbox/task.md").exists());
    assert_eq!(vault.read("archive/2026/task.md"), "# Task\n\nParent: [A](../../a.md)\n");
}

#[test]
fn soft_delete_moves_to_trash_and_marks_links() {
    let vault = Vault::new("");
    vault.vdx().args(["delete", "b.md"]).assert().success();

    assert!(!vault.root.join("b.md").exists());
    let trashed = vault.files_in(".trash");
    assert_eq!(trashed.len(), 1);
    assert!(trashed[0].ends_with("-b.md"), "unexpected trash entry {trashed:?}");
    assert_eq!(vault.read("a.md"), "# A\n\nSee ~~b~~ (deleted) and ~~B again~~ (deleted).\n");
}

#[test]
fn permanent_delete_requires_confirmation() {
    let vault = Vault::new("");
    vault
        .vdx()
        .args(["delete", "b.md", "--permanent"])
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cancelled."));
    assert!(vault.root.join("b.md").exists());

    vault.vdx().args(["delete", "b.md", "--permanent", "--yes"]).assert().success();
    assert!(!vault.root.join("b.md").exists());
    assert!(!vault.root.join(".trash").exists());
}

#[test]
fn set_merges_frontmatter() {
    let vault = Vault::new("");
    vault.vdx().args(["set", "b.md", "status=done", "priority=2"]).assert().success();

    let content = vault.read("b.md");
    assert!(content.contains("status: done"), "content was: {content}");
    assert!(content.contains("priority: 2"), "content was: {content}");
    assert!(content.contains("Body of b."));
}

#[test]
fn set_dry_run_renders_diff() {
    let vault = Vault::new("");
    let output = vault
        .vdx()
        .args(["set", "b.md", "status=done", "priority=2", "--dry-run"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let stdout = stdout.replace(&vault.root.display().to_string(), "<VAULT>");
    insta::assert_snapshot!(stdout, @r"
    update-frontmatter: b.md

      update frontmatter of <VAULT>/b.md
      + priority: 2
      ~ status: draft -> done

    (dry-run mode - no changes made)
    ");
    assert!(vault.read("b.md").contains("status: draft"));
}

#[test]
fn backup_flag_copies_document_first() {
    let vault = Vault::new("[operations]\nbackup_dir = \"_backups\"\n");
    vault
        .vdx()
        .args(["set", "b.md", "status=done", "--backup"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup: _backups/"));

    let backups = vault.files_in("_backups");
    assert_eq!(backups.len(), 1);
    assert!(fs::read_to_string(vault.root.join("_backups").join(&backups[0]))
        .unwrap()
        .contains("status: draft"));
}

#[test]
fn json_result_for_scripts() {
    let vault = Vault::new("");
    let output = vault.vdx().args(["rename", "b.md", "c", "--json"]).output().unwrap();
    assert!(output.status.success());

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["kind"], "rename");
    assert_eq!(result["success"], true);
    assert_eq!(result["references_updated"], 2);
}

#[test]
fn watch_stops_at_end_of_input() {
    let vault = Vault::new("");
    vault
        .vdx()
        .arg("watch")
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("Watching"))
        .stdout(predicate::str::contains("(3 documents)"));
}
