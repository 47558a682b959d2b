//! CLI integration tests
//!
//! Everything here runs offline: collections are built with the hashing
//! embedder and no command reaches the generative model.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const LOCATIONS: &str = "\
일련번호,미디어유형,제목명,장소명,장소유형,주소
1,drama,슬기로운 의사생활,율제병원,병원,서울 송파구
2,drama,슬기로운 의사생활,캠핑장,야외,경기 가평군
3,drama,도깨비,주문진 방파제,해변,강원 강릉시
";

/// Helper to get CLI command
fn cli() -> Command {
    let mut cmd = Command::cargo_bin("feelko").unwrap();
    cmd.env_remove("FEELKO_CONFIG").env("RUST_LOG", "warn");
    cmd
}

fn write_csv(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("locations.csv");
    fs::write(&path, LOCATIONS).unwrap();
    path
}

fn build_index(dir: &TempDir) -> std::path::PathBuf {
    let csv = write_csv(dir.path());
    let store = dir.path().join("store");
    cli()
        .args(["index", "--csv"])
        .arg(&csv)
        .args(["--embedder", "hashing", "--dimension", "128", "--store"])
        .arg(&store)
        .assert()
        .success();
    store
}

// ============================================================================
// INFO COMMAND TESTS
// ============================================================================

#[test]
fn test_info_shows_version() {
    cli()
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("FeelKo"))
        .stdout(predicate::str::contains("Version:"));
}

#[test]
fn test_info_shows_configuration() {
    cli()
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("gemini-2.5-flash"))
        .stdout(predicate::str::contains("GOOGLE_API_KEY"))
        .stdout(predicate::str::contains("collection: documents"));
}

#[test]
fn test_info_reads_config_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("feelko.toml");
    fs::write(&config, "[store]\ncollection = \"dramas\"\n").unwrap();

    cli()
        .arg("--config")
        .arg(&config)
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("collection: dramas"));
}

#[test]
fn test_invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("feelko.toml");
    fs::write(&config, "[chunking]\ncsv_chunk_size = 10\ncsv_overlap = 10\n").unwrap();

    cli()
        .arg("--config")
        .arg(&config)
        .arg("info")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

// ============================================================================
// INDEX COMMAND TESTS
// ============================================================================

#[test]
fn test_index_csv_with_hashing_embedder() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(dir.path());
    let store = dir.path().join("store");

    cli()
        .args(["index", "--csv"])
        .arg(&csv)
        .args(["--embedder", "hashing", "--dimension", "128", "--store"])
        .arg(&store)
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded 3 records"))
        .stdout(predicate::str::contains("hashing-128"));

    assert!(store.join("documents.json").exists());
}

#[test]
fn test_index_custom_collection() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(dir.path());

    cli()
        .args(["index", "--csv"])
        .arg(&csv)
        .args(["--embedder", "hashing", "--collection", "dramas", "--store"])
        .arg(dir.path())
        .assert()
        .success();

    assert!(dir.path().join("dramas.json").exists());
}

#[test]
fn test_index_missing_file() {
    cli()
        .args(["index", "--csv", "/nonexistent/locations.csv", "--embedder", "hashing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Path not found"));
}

#[test]
fn test_index_requires_source() {
    cli().arg("index").assert().failure();
}

#[test]
fn test_index_rejects_csv_and_url_together() {
    cli()
        .args(["index", "--csv", "a.csv", "--url", "https://example.com"])
        .assert()
        .failure();
}

#[test]
fn test_index_missing_title_column() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("bad.csv");
    fs::write(&csv, "name,place\n도깨비,주문진\n").unwrap();

    cli()
        .args(["index", "--embedder", "hashing", "--csv"])
        .arg(&csv)
        .assert()
        .failure()
        .stderr(predicate::str::contains("제목명"));
}

#[test]
fn test_index_invalid_overlap() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(dir.path());

    cli()
        .args(["index", "--embedder", "hashing", "--chunk-size", "20", "--chunk-overlap", "20", "--csv"])
        .arg(&csv)
        .arg("--store")
        .arg(dir.path())
        .assert()
        .failure();
}

#[test]
fn test_index_append() {
    let dir = TempDir::new().unwrap();
    let store = build_index(&dir);
    let csv = write_csv(dir.path());

    cli()
        .args(["index", "--append", "--embedder", "hashing", "--dimension", "128", "--csv"])
        .arg(&csv)
        .arg("--store")
        .arg(&store)
        .assert()
        .success()
        .stdout(predicate::str::contains("Indexed 6 chunks"));
}

#[test]
fn test_index_hosted_without_key_fails() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(dir.path());

    cli()
        .env_remove("GOOGLE_API_KEY")
        .args(["index", "--embedder", "hosted", "--csv"])
        .arg(&csv)
        .arg("--store")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("GOOGLE_API_KEY"));
}

#[cfg(feature = "embeddings")]
#[test]
fn test_index_local_rejects_hosted_model_name() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(dir.path());

    cli()
        .args(["index", "--embedder", "local", "--csv"])
        .arg(&csv)
        .arg("--store")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "'text-embedding-004' is not a local embedding model",
        ));
}

#[cfg(not(feature = "embeddings"))]
#[test]
fn test_index_local_requires_feature() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(dir.path());

    cli()
        .args(["index", "--embedder", "local", "--csv"])
        .arg(&csv)
        .arg("--store")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("'embeddings' feature"));
}

// ============================================================================
// ASK COMMAND TESTS
// ============================================================================

#[test]
fn test_ask_dry_run_prints_context_and_prompt() {
    let dir = TempDir::new().unwrap();
    let store = build_index(&dir);

    cli()
        .args(["ask", "슬기로운 의사생활", "--dry-run", "--embedder", "hashing", "--dimension", "128", "--store"])
        .arg(&store)
        .assert()
        .success()
        .stdout(predicate::str::contains("Retrieved Context (Top 3)"))
        .stdout(predicate::str::contains("장소명: 율제병원"))
        .stdout(predicate::str::contains("맥락에 없는 내용은 답변하지 마세요."))
        .stdout(predicate::str::contains("질문: 슬기로운 의사생활"));
}

#[test]
fn test_ask_dry_run_top_k() {
    let dir = TempDir::new().unwrap();
    let store = build_index(&dir);

    cli()
        .args(["ask", "도깨비", "--dry-run", "--top-k", "1", "--embedder", "hashing", "--dimension", "128", "--store"])
        .arg(&store)
        .assert()
        .success()
        .stdout(predicate::str::contains("Top 1"))
        .stdout(predicate::str::contains("Source: 도깨비"));
}

#[test]
fn test_ask_dry_run_without_index() {
    let dir = TempDir::new().unwrap();

    cli()
        .args(["ask", "도깨비", "--dry-run", "--embedder", "hashing", "--store"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("feelko index"));
}

#[test]
fn test_ask_dimension_mismatch() {
    let dir = TempDir::new().unwrap();
    let store = build_index(&dir);

    cli()
        .args(["ask", "도깨비", "--dry-run", "--embedder", "hashing", "--dimension", "64", "--store"])
        .arg(&store)
        .assert()
        .failure();
}

#[test]
fn test_ask_without_credential_fails() {
    let dir = TempDir::new().unwrap();
    let store = build_index(&dir);

    cli()
        .env_remove("GOOGLE_API_KEY")
        .args(["ask", "도깨비", "--embedder", "hashing", "--dimension", "128", "--store"])
        .arg(&store)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "environment variable GOOGLE_API_KEY is not set",
        ));
}

#[test]
fn test_ask_custom_credential_variable() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("feelko.toml");
    fs::write(&config, "api_key_env = \"FEELKO_CLI_TEST_KEY\"\n").unwrap();

    cli()
        .env_remove("FEELKO_CLI_TEST_KEY")
        .arg("--config")
        .arg(&config)
        .args(["ask", "도깨비", "--embedder", "hashing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("FEELKO_CLI_TEST_KEY"));
}

// ============================================================================
// CHAT COMMAND TESTS
// ============================================================================

#[test]
fn test_chat_without_credential_fails() {
    cli()
        .env_remove("GOOGLE_API_KEY")
        .args(["chat", "--embedder", "hashing"])
        .write_stdin("도깨비\n/quit\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("GOOGLE_API_KEY"));
}

// ============================================================================
// HELP TESTS
// ============================================================================

#[test]
fn test_help_lists_commands() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("index"))
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("info"));
}
