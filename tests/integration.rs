use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const SECRET: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

fn catalog_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("catalog");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    fs::write(
        data_dir.join("data_1.json"),
        r#"[{"product":"Produto Teste 1","type":"Tipo A","price":"$19.99","quantity":100}]"#,
    )
    .unwrap();
    fs::write(
        data_dir.join("data_2.json"),
        r#"{"data":[
            {"product":"Shampoo","type":"Hair","price":"R$10,50","quantity":5,"industry":"Beauty","origin":"SP"},
            {"product":"Broken","type":"Hair","price":"abc","quantity":5}
        ]}"#,
    )
    .unwrap();
    // Not matched by the discovery pattern.
    fs::write(data_dir.join("other.json"), r#"[{"product":"Nope"}]"#).unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/db/catalog.sqlite"

[server]
bind = "127.0.0.1:0"

[auth]
jwt_secret = "{secret}"

[import]
root = "{root}/data"
max_concurrency = 2
"#,
        root = root.display(),
        secret = SECRET,
    );

    let config_path = config_dir.join("catalog.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_catalog(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = catalog_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("CATALOG_JWT_SECRET")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run catalog binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_catalog(&config, &["init"]);
    assert!(ok, "init failed: {}", stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("db/catalog.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config) = setup_test_env();
    assert!(run_catalog(&config, &["init"]).2);
    let (_, stderr, ok) = run_catalog(&config, &["init"]);
    assert!(ok, "second init failed: {}", stderr);
}

#[test]
fn test_import_saves_valid_records() {
    let (_tmp, config) = setup_test_env();
    run_catalog(&config, &["init"]);

    let (stdout, stderr, ok) = run_catalog(&config, &["import"]);
    assert!(ok, "import failed: {}", stderr);
    assert!(stdout.contains("files found: 2"), "stdout: {}", stdout);
    assert!(stdout.contains("rejected records: 1"), "stdout: {}", stdout);
    assert!(stdout.contains("inserted: 2"), "stdout: {}", stdout);

    // The malformed price is logged, not fatal.
    assert!(stderr.contains("record rejected"), "stderr: {}", stderr);
}

#[test]
fn test_import_twice_inserts_nothing_new() {
    let (_tmp, config) = setup_test_env();
    run_catalog(&config, &["init"]);
    run_catalog(&config, &["import"]);

    let (stdout, _, ok) = run_catalog(&config, &["import"]);
    assert!(ok);
    assert!(stdout.contains("inserted: 0"), "stdout: {}", stdout);
    assert!(stdout.contains("duplicates skipped: 2"), "stdout: {}", stdout);
}

#[test]
fn test_import_dry_run_writes_nothing() {
    let (_tmp, config) = setup_test_env();
    run_catalog(&config, &["init"]);

    let (stdout, _, ok) = run_catalog(&config, &["import", "--dry-run"]);
    assert!(ok);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("valid records: 2"), "stdout: {}", stdout);

    let (stats, _, _) = run_catalog(&config, &["stats"]);
    assert!(stats.contains("Products:    0"), "stats: {}", stats);
}

#[test]
fn test_import_with_missing_root_is_not_fatal() {
    let (tmp, config) = setup_test_env();
    run_catalog(&config, &["init"]);
    fs::remove_dir_all(tmp.path().join("data")).unwrap();

    let (stdout, stderr, ok) = run_catalog(&config, &["import"]);
    assert!(ok, "import should not fail: {}", stderr);
    assert!(stdout.contains("inserted: 0"));
}

#[test]
fn test_stats_after_import() {
    let (_tmp, config) = setup_test_env();
    run_catalog(&config, &["init"]);
    run_catalog(&config, &["import"]);

    let (stdout, stderr, ok) = run_catalog(&config, &["stats"]);
    assert!(ok, "stats failed: {}", stderr);
    assert!(stdout.contains("Products:    2"), "stdout: {}", stdout);
    assert!(stdout.contains("Stock units: 105"), "stdout: {}", stdout);
    assert!(stdout.contains("Beauty"));
}

#[test]
fn test_user_add_and_duplicate() {
    let (_tmp, config) = setup_test_env();
    run_catalog(&config, &["init"]);

    let (stdout, stderr, ok) = run_catalog(
        &config,
        &["user", "add", "admin", "admin@example.com", "--password", "changeme", "--role", "admin"],
    );
    assert!(ok, "user add failed: {}", stderr);
    assert!(stdout.contains("roles: ADMIN"), "stdout: {}", stdout);

    let (_, stderr, ok) = run_catalog(
        &config,
        &["user", "add", "admin", "x@example.com", "--password", "changeme"],
    );
    assert!(!ok);
    assert!(stderr.contains("already taken"), "stderr: {}", stderr);
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, ok) = run_catalog(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!ok);
    assert!(stderr.contains("Failed to read config file"));
}
