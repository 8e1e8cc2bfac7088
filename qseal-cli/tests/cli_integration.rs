//! CLI integration tests for qseal-cli.
//!
//! These tests verify the CLI behavior by running the actual binary
//! and checking outputs, exit codes, and file artifacts.

use assert_cmd::Command;
use image::{Rgba, RgbaImage};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get a Command for the qseal binary.
fn qseal() -> Command {
    Command::cargo_bin("qseal").unwrap()
}

/// Write a synthetic document image large enough for a cleanly decodable
/// seal at default module sizes.
fn write_test_document(path: &Path) {
    let mut image = RgbaImage::new(1600, 1600);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        *pixel = Rgba([
            (x % 256) as u8,
            (y % 256) as u8,
            ((x + y) % 256) as u8,
            255,
        ]);
    }
    image.save(path).unwrap();
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    qseal()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "QR document attestation sealing and verification",
        ))
        .stdout(predicate::str::contains("seal"))
        .stdout(predicate::str::contains("verify"))
        .stdout(predicate::str::contains("keygen"));
}

#[test]
fn test_version_displays_version() {
    qseal()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("qseal"));
}

#[test]
fn test_help_shows_exit_codes() {
    qseal()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("65"))
        .stdout(predicate::str::contains("66"));
}

#[test]
fn test_seal_help_shows_options() {
    qseal()
        .args(["seal", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--provider"))
        .stdout(predicate::str::contains("--identifier"))
        .stdout(predicate::str::contains("--key"))
        .stdout(predicate::str::contains("--server"));
}

// ============================================================================
// Keygen Tests
// ============================================================================

#[test]
fn test_keygen_writes_key_file() {
    let dir = TempDir::new().unwrap();
    let key_path = dir.path().join("key.json");

    qseal()
        .args(["keygen", "-o"])
        .arg(&key_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("keypair generated"));

    let raw = fs::read_to_string(&key_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(parsed["keyId"].as_str().unwrap().starts_with("local-"));
    assert!(parsed["privateKey"].is_string());
    assert!(parsed["publicKey"].is_string());
}

#[test]
fn test_keygen_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    let key_path = dir.path().join("key.json");
    fs::write(&key_path, "{}").unwrap();

    qseal()
        .args(["keygen", "-o"])
        .arg(&key_path)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Refusing to overwrite"));
}

// ============================================================================
// Exit Code Tests
// ============================================================================

#[test]
fn test_seal_missing_file_exits_66() {
    let dir = TempDir::new().unwrap();
    let key_path = dir.path().join("key.json");
    qseal()
        .args(["keygen", "-o"])
        .arg(&key_path)
        .assert()
        .success();

    qseal()
        .args([
            "seal",
            "/nonexistent/document.png",
            "--provider",
            "email",
            "--identifier",
            "alice@example.com",
            "--key",
        ])
        .arg(&key_path)
        .assert()
        .failure()
        .code(66)
        .stderr(predicate::str::contains("Failed to read file"));
}

#[test]
fn test_verify_without_key_source_exits_64() {
    let dir = TempDir::new().unwrap();
    let doc = dir.path().join("document.png");
    write_test_document(&doc);

    qseal()
        .arg("verify")
        .arg(&doc)
        .assert()
        .failure()
        .code(64)
        .stderr(predicate::str::contains("--public-key"));
}

#[test]
fn test_verify_unsealed_image_exits_65() {
    let dir = TempDir::new().unwrap();
    let doc = dir.path().join("document.png");
    write_test_document(&doc);
    let key_path = dir.path().join("key.json");
    qseal()
        .args(["keygen", "-o"])
        .arg(&key_path)
        .assert()
        .success();

    qseal()
        .arg("verify")
        .arg(&doc)
        .arg("--public-key")
        .arg(&key_path)
        .assert()
        .failure()
        .code(65)
        .stderr(predicate::str::contains("not be sealed"));
}

// ============================================================================
// End-to-End Workflow Tests
// ============================================================================

#[test]
fn test_keygen_seal_verify_roundtrip() {
    let dir = TempDir::new().unwrap();
    let key_path = dir.path().join("key.json");
    let doc = dir.path().join("contract.png");
    write_test_document(&doc);

    qseal()
        .args(["keygen", "-o"])
        .arg(&key_path)
        .assert()
        .success();

    qseal()
        .arg("seal")
        .arg(&doc)
        .args([
            "--provider",
            "email",
            "--identifier",
            "alice@example.com",
            "--size-pct",
            "25",
            "--key",
        ])
        .arg(&key_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Document sealed!"));

    let sealed = dir.path().join("contract.sealed.png");
    assert!(sealed.exists());

    qseal()
        .arg("verify")
        .arg(&sealed)
        .arg("--public-key")
        .arg(&key_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("VERIFIED"))
        .stdout(predicate::str::contains("alice@example.com"));
}

#[test]
fn test_tampered_pixel_fails_verification() {
    let dir = TempDir::new().unwrap();
    let key_path = dir.path().join("key.json");
    let doc = dir.path().join("contract.png");
    write_test_document(&doc);

    qseal()
        .args(["keygen", "-o"])
        .arg(&key_path)
        .assert()
        .success();

    qseal()
        .arg("seal")
        .arg(&doc)
        .args([
            "--provider",
            "email",
            "--identifier",
            "alice@example.com",
            "--size-pct",
            "25",
            "--key",
        ])
        .arg(&key_path)
        .assert()
        .success();

    // Flip one pixel far from the seal area (placed bottom-right by default)
    let sealed = dir.path().join("contract.sealed.png");
    let mut image = image::open(&sealed).unwrap().to_rgba8();
    image.put_pixel(10, 10, Rgba([255, 0, 255, 255]));
    image.save(&sealed).unwrap();

    qseal()
        .arg("verify")
        .arg(&sealed)
        .arg("--public-key")
        .arg(&key_path)
        .assert()
        .failure()
        .code(65)
        .stderr(predicate::str::contains("modified"));
}

#[test]
fn test_wrong_key_is_reported_as_unproven() {
    let dir = TempDir::new().unwrap();
    let signing_key = dir.path().join("signing.json");
    let other_key = dir.path().join("other.json");
    let doc = dir.path().join("contract.png");
    write_test_document(&doc);

    qseal()
        .args(["keygen", "-o"])
        .arg(&signing_key)
        .assert()
        .success();
    qseal()
        .args(["keygen", "-o"])
        .arg(&other_key)
        .assert()
        .success();

    qseal()
        .arg("seal")
        .arg(&doc)
        .args([
            "--provider",
            "email",
            "--identifier",
            "alice@example.com",
            "--size-pct",
            "25",
            "--key",
        ])
        .arg(&signing_key)
        .assert()
        .success();

    // The other key file carries a different key id, so resolution fails
    // and the signature cannot be authenticated
    qseal()
        .arg("verify")
        .arg(dir.path().join("contract.sealed.png"))
        .arg("--public-key")
        .arg(&other_key)
        .assert()
        .failure()
        .code(65)
        .stdout(predicate::str::contains("UNPROVEN"));
}

#[test]
fn test_seal_with_explicit_output_path() {
    let dir = TempDir::new().unwrap();
    let key_path = dir.path().join("key.json");
    let doc = dir.path().join("contract.png");
    let out = dir.path().join("stamped.png");
    write_test_document(&doc);

    qseal()
        .args(["keygen", "-o"])
        .arg(&key_path)
        .assert()
        .success();

    qseal()
        .arg("seal")
        .arg(&doc)
        .args([
            "--provider",
            "email",
            "--identifier",
            "alice@example.com",
            "--size-pct",
            "25",
            "--key",
        ])
        .arg(&key_path)
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    assert!(out.exists());
    assert!(!dir.path().join("contract.sealed.png").exists());
}

#[test]
fn test_quiet_suppresses_stdout() {
    let dir = TempDir::new().unwrap();
    let key_path = dir.path().join("key.json");

    qseal()
        .args(["--quiet", "keygen", "-o"])
        .arg(&key_path)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}
