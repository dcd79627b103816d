use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const KEY_VARIABLE: &str = "CONTACT_VAULT_ENCRYPTION_KEY";
const KEY: &str = "correct horse battery staple";

/// A vault rooted in a temp dir with cheap key derivation
struct TestVault {
    dir: TempDir,
    config: PathBuf,
}

impl TestVault {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("vault.toml");
        fs::write(
            &config,
            format!(
                r#"
[storage]
base_dir = '{}'

[encryption]
kdf_memory_kib = 64
kdf_iterations = 1

[logging]
level = "warn"
"#,
                dir.path().display()
            ),
        )
        .unwrap();

        Self { dir, config }
    }

    fn storage_dir(&self) -> PathBuf {
        self.dir.path().join("CovidCustomerDataFiles")
    }

    fn exports_dir(&self) -> PathBuf {
        self.storage_dir().join("Exports")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("contactctl").unwrap();
        cmd.env_remove("CONTACT_VAULT_CONFIG")
            .env_remove("RUST_LOG")
            .env(KEY_VARIABLE, KEY)
            .arg("--no-color")
            .arg("--config")
            .arg(&self.config);
        cmd
    }

    fn save(&self, name: &str, phone: &str) {
        self.cmd()
            .args(["save", "--name", name, "--phone", phone])
            .assert()
            .success();
    }
}

fn files_in(dir: &Path) -> Vec<PathBuf> {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().path())
            .filter(|p| p.is_file())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("contactctl").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Record and export point-of-sale visit data"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("contactctl").unwrap();
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("contactctl"));
}

#[test]
fn test_purge_command_help() {
    let mut cmd = Command::cargo_bin("contactctl").unwrap();
    cmd.args(["purge", "--help"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_missing_explicit_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("contactctl").unwrap();
    cmd.arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("status");
    cmd.assert()
        .code(2)
        .stderr(predicate::str::contains("Configuration Error"));
}

#[test]
fn test_status_json_reports_key() {
    let vault = TestVault::new();
    vault
        .cmd()
        .args(["--format", "json", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"key_configured\": true"))
        .stdout(predicate::str::contains("\"archives\": 0"));
}

#[test]
fn test_save_from_arguments() {
    let vault = TestVault::new();
    vault
        .cmd()
        .args(["save", "--name", "Jane Doe", "--phone", "5551234567"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Successfully saved customer records"));

    let archives = files_in(&vault.storage_dir());
    assert_eq!(archives.len(), 1);
    let name = archives[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("DailyCustomerData") && name.ends_with(".zip"));
}

#[test]
fn test_save_from_stdin() {
    let vault = TestVault::new();
    vault
        .cmd()
        .arg("save")
        .write_stdin("Amar Singh\n5559876543\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Enter Customers Full Name"))
        .stdout(predicate::str::contains("Successfully saved customer records"));
}

#[test]
fn test_save_with_blank_name_records_nothing() {
    let vault = TestVault::new();
    vault
        .cmd()
        .arg("save")
        .write_stdin("\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing recorded"))
        .stdout(predicate::str::contains("Enter Customers Full Phone Number").not());

    assert!(files_in(&vault.storage_dir()).is_empty());
}

#[test]
fn test_save_rejects_comma_in_name() {
    let vault = TestVault::new();
    vault
        .cmd()
        .args(["save", "--name", "Doe, Jane", "--phone", "5551234567"])
        .assert()
        .code(5);

    assert!(files_in(&vault.storage_dir()).is_empty());
}

#[test]
fn test_save_without_key() {
    let vault = TestVault::new();
    vault
        .cmd()
        .env_remove(KEY_VARIABLE)
        .args(["save", "--name", "Jane Doe", "--phone", "5551234567"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains(
            "The customer data encryption key is not configured.",
        ));

    assert!(files_in(&vault.storage_dir()).is_empty());
}

#[test]
fn test_export_with_correct_key() {
    let vault = TestVault::new();
    vault.save("Jane Doe", "5551234567");

    vault
        .cmd()
        .arg("export")
        .write_stdin(format!("{KEY}\ny\n"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 1 customer records to:"))
        .stdout(predicate::str::contains("Failed to export 0 customer records"));

    let exports = files_in(&vault.exports_dir());
    assert_eq!(exports.len(), 1);
    assert_eq!(exports[0].extension().unwrap(), "csv");

    let csv = fs::read_to_string(&exports[0]).unwrap();
    assert!(csv.starts_with("Jane Doe,5551234567,"));
}

#[test]
fn test_export_with_wrong_key() {
    let vault = TestVault::new();
    vault.save("Jane Doe", "5551234567");

    vault
        .cmd()
        .arg("export")
        .write_stdin("not the key\ny\n")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Incorrect Encryption Key"));

    assert!(files_in(&vault.exports_dir()).is_empty());
}

#[test]
fn test_export_declined() {
    let vault = TestVault::new();
    vault.save("Jane Doe", "5551234567");

    vault
        .cmd()
        .arg("export")
        .write_stdin(format!("{KEY}\nn\n"))
        .assert()
        .code(130);

    assert!(files_in(&vault.exports_dir()).is_empty());
}

#[test]
fn test_purge_dry_run_keeps_fresh_archives() {
    let vault = TestVault::new();
    vault.save("Jane Doe", "5551234567");

    vault
        .cmd()
        .args(["purge", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Would delete 0 expired file(s)"));

    vault
        .cmd()
        .args(["--format", "json", "purge"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"dry_run\": false"))
        .stdout(predicate::str::contains("\"files\": []"));

    assert_eq!(files_in(&vault.storage_dir()).len(), 1);
}

#[test]
fn test_config_show_redacts_inline_key() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("vault.toml");
    fs::write(
        &config,
        format!(
            r#"
[storage]
base_dir = '{}'

[key_source]
type = "inline"
key = "hunter2"
"#,
            dir.path().display()
        ),
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("contactctl").unwrap();
    cmd.env_remove("CONTACT_VAULT_CONFIG")
        .arg("--config")
        .arg(&config)
        .args(["config", "show"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("<redacted>"))
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    let vault = TestVault::new();
    let target = vault.dir.path().join("fresh.toml");

    vault
        .cmd()
        .args(["config", "init", "--file"])
        .arg(&target)
        .assert()
        .success();
    assert!(target.exists());

    vault
        .cmd()
        .args(["config", "validate", "--file"])
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));

    vault
        .cmd()
        .args(["config", "init", "--file"])
        .arg(&target)
        .assert()
        .code(7);

    vault
        .cmd()
        .args(["config", "init", "--force", "--file"])
        .arg(&target)
        .assert()
        .success();
}
