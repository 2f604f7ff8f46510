//! CLI integration tests for cast
//!
//! These tests drive the `cast` binary against plugin files in a temporary
//! directory, from writing a config through running a patch.

use std::fs;
use std::path::{Path, PathBuf};

use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

/// Get a command instance for the cast binary, isolated from the caller's environment
fn cast_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("cast"));
    cmd.current_dir(dir)
        .env_remove("CAST_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

fn npc(edid: &str) -> Value {
    json!({
        "form_key": format!("{}:Base.esm", edid),
        "signature": "NPC_",
        "editor_id": edid,
        "race": "HumanRace",
    })
}

fn lvln(edid: &str, refs: &[&str]) -> Value {
    let entries: Vec<Value> = refs
        .iter()
        .map(|r| json!({"level": 1, "reference": format!("{}:Base.esm", r), "count": 1}))
        .collect();
    json!({
        "form_key": format!("{}:Base.esm", edid),
        "signature": "LVLN",
        "editor_id": edid,
        "entries": entries,
    })
}

fn flst(edid: &str, refs: &[&str]) -> Value {
    let members: Vec<String> = refs.iter().map(|r| format!("{}:Base.esm", r)).collect();
    json!({
        "form_key": format!("{}:Base.esm", edid),
        "signature": "FLST",
        "editor_id": edid,
        "members": members,
    })
}

fn write_plugin(dir: &Path, name: &str, records: &[Value]) -> PathBuf {
    let path = dir.join(name);
    let lines: Vec<String> = records.iter().map(|r| r.to_string()).collect();
    fs::write(&path, lines.join("\n") + "\n").unwrap();
    path
}

fn read_plugin(path: &Path) -> Vec<Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn write_config(dir: &Path, targets: &str) -> PathBuf {
    let path = dir.join("cast.toml");
    fs::write(&path, format!("[targets]\n{}\n", targets)).unwrap();
    path
}

/// A base plugin with raiders and a config targeting LCharRaider
fn setup_raiders() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_plugin(
        dir.path(),
        "Base.jsonl",
        &[
            npc("RaiderA"),
            npc("RaiderB"),
            npc("RaiderC"),
            lvln("LCharRaider", &["RaiderA", "RaiderB", "RaiderC"]),
            lvln("LCharBoss", &["RaiderC"]),
            flst("RaiderFaces", &["RaiderA", "RaiderB"]),
        ],
    );
    write_config(dir.path(), "LCharRaider = 10");
    dir
}

fn patch_json(dir: &Path, args: &[&str]) -> Value {
    let output = cast_cmd(dir)
        .args(["patch", "Base.jsonl", "--format", "json"])
        .args(args)
        .assert()
        .success();
    serde_json::from_slice(&output.get_output().stdout).unwrap()
}

// =============================================================================
// Init Tests
// =============================================================================

#[test]
fn test_init_writes_default_config() {
    let dir = TempDir::new().unwrap();

    cast_cmd(dir.path())
        .arg("init")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote default config"));

    let content = fs::read_to_string(dir.path().join("cast.toml")).unwrap();
    assert!(content.contains("clone_suffix = \"_acot\""));
    assert!(content.contains("LCharWorkshopNPC = 1280"));
}

#[test]
fn test_init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    write_config(dir.path(), "LCharRaider = 10");

    cast_cmd(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));

    // Existing file untouched
    let content = fs::read_to_string(dir.path().join("cast.toml")).unwrap();
    assert_eq!(content, "[targets]\nLCharRaider = 10\n");
}

// =============================================================================
// Target Tests
// =============================================================================

#[test]
fn test_targets_lists_config() {
    let dir = setup_raiders();

    cast_cmd(dir.path())
        .arg("targets")
        .assert()
        .success()
        .stdout(predicate::str::contains("LCharRaider\t10"));
}

#[test]
fn test_targets_json() {
    let dir = setup_raiders();

    let output = cast_cmd(dir.path())
        .args(["targets", "--format", "json"])
        .assert()
        .success();
    let json: Value = serde_json::from_slice(&output.get_output().stdout).unwrap();

    assert_eq!(json["targets"], json!({"LCharRaider": 10}));
    assert!(json["source"].as_str().unwrap().ends_with("cast.toml"));
}

#[test]
fn test_target_set_and_remove() {
    let dir = setup_raiders();

    cast_cmd(dir.path())
        .args(["target", "set", "LCharBoss", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added LCharBoss = 4"));

    cast_cmd(dir.path())
        .args(["target", "set", "LCharRaider", "12"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Changed LCharRaider from 10 to 12"));

    cast_cmd(dir.path())
        .args(["target", "remove", "LCharBoss"])
        .assert()
        .success();

    let content = fs::read_to_string(dir.path().join("cast.toml")).unwrap();
    assert!(content.contains("LCharRaider = 12"));
    assert!(!content.contains("LCharBoss"));
}

#[test]
fn test_target_remove_unknown_fails() {
    let dir = setup_raiders();

    cast_cmd(dir.path())
        .args(["target", "remove", "LCharNobody"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No target named LCharNobody"));
}

#[test]
fn test_target_set_zero_fails() {
    let dir = setup_raiders();

    cast_cmd(dir.path())
        .args(["target", "set", "LCharRaider", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be at least 1"));
}

#[test]
fn test_explicit_config_path() {
    let dir = setup_raiders();
    let other = dir.path().join("other.toml");
    fs::write(&other, "[targets]\nLCharBoss = 3\n").unwrap();

    cast_cmd(dir.path())
        .args(["targets", "--config"])
        .arg(&other)
        .assert()
        .success()
        .stdout(predicate::str::contains("LCharBoss\t3"))
        .stdout(predicate::str::contains("LCharRaider").not());
}

// =============================================================================
// Patch Tests
// =============================================================================

#[test]
fn test_patch_grows_target() {
    let dir = setup_raiders();

    let json = patch_json(dir.path(), &[]);
    let report = &json["report"];

    assert_eq!(report["targets"][0]["key"], "LCharRaider");
    assert_eq!(report["targets"][0]["container"], "list");
    assert_eq!(report["targets"][0]["clones_created"], 7);
    assert_eq!(report["targets"][0]["final_count"], 10);
    assert_eq!(report["related_lists"], json!(["LCharBoss"]));
    assert_eq!(report["related_sets"], json!(["RaiderFaces"]));
    // 7 entries in LCharRaider + 2 clones of RaiderC in LCharBoss
    assert_eq!(report["entries_added"], 9);
    // 3 clones of RaiderA + 2 of RaiderB
    assert_eq!(report["memberships_added"], 5);
    assert_eq!(report["patch_digest"].as_str().unwrap().len(), 64);

    let patch = dir.path().join("zPatch.jsonl");
    assert!(json["patch"].as_str().unwrap().ends_with("zPatch.jsonl"));
    assert!(patch.is_file());
}

#[test]
fn test_patch_file_contents() {
    let dir = setup_raiders();
    patch_json(dir.path(), &[]);

    let records = read_plugin(&dir.path().join("zPatch.jsonl"));
    let clones: Vec<_> = records
        .iter()
        .filter(|r| r["signature"] == "NPC_")
        .collect();
    assert_eq!(clones.len(), 7);
    assert_eq!(clones[0]["editor_id"], "RaiderA_acot0");
    assert_eq!(clones[0]["form_key"], "000800:zPatch.jsonl");
    // Unmodelled fields travel with the clone
    assert_eq!(clones[0]["race"], "HumanRace");

    let raider = records
        .iter()
        .find(|r| r["editor_id"] == "LCharRaider")
        .unwrap();
    assert_eq!(raider["entries"].as_array().unwrap().len(), 10);

    // The base plugin is never modified
    let base = read_plugin(&dir.path().join("Base.jsonl"));
    assert_eq!(base.len(), 6);
}

#[test]
fn test_patch_text_output() {
    let dir = setup_raiders();

    cast_cmd(dir.path())
        .args(["patch", "Base.jsonl"])
        .assert()
        .success()
        .stdout(predicate::str::contains("LCharRaider\tlist\t3 leaves\t+7 clones\t10/10"))
        .stdout(predicate::str::contains("Related lists: LCharBoss"))
        .stdout(predicate::str::contains(
            "Created 7 clones, added 9 entries and 5 memberships",
        ))
        .stderr(predicate::str::contains("Creating 7 new leaves"));
}

#[test]
fn test_patch_custom_output_path() {
    let dir = setup_raiders();

    patch_json(dir.path(), &["--output", "out/Custom.jsonl"]);

    let records = read_plugin(&dir.path().join("out/Custom.jsonl"));
    assert_eq!(records[0]["form_key"], "000800:Custom.jsonl");
    assert!(!dir.path().join("zPatch.jsonl").exists());
}

#[test]
fn test_patch_unknown_target_warns() {
    let dir = setup_raiders();
    write_config(dir.path(), "LCharMissing = 5\nLCharRaider = 4");

    let json = patch_json(dir.path(), &[]);
    let report = &json["report"];

    assert_eq!(report["warnings"][0]["kind"], "target_not_found");
    assert_eq!(report["warnings"][0]["key"], "LCharMissing");
    assert_eq!(report["targets"].as_array().unwrap().len(), 1);
}

#[test]
fn test_patch_respects_load_order() {
    let dir = setup_raiders();
    write_plugin(
        dir.path(),
        "Mod.jsonl",
        &[json!({
            "form_key": "RaiderA:Base.esm",
            "signature": "NPC_",
            "editor_id": "RaiderA",
            "name": "Tough Raider",
        })],
    );

    cast_cmd(dir.path())
        .args(["patch", "Base.jsonl", "Mod.jsonl", "--format", "json"])
        .assert()
        .success();

    let records = read_plugin(&dir.path().join("zPatch.jsonl"));
    let clone = records
        .iter()
        .find(|r| r["editor_id"] == "RaiderA_acot0")
        .unwrap();
    assert_eq!(clone["name"], "Tough Raider");
}

#[test]
fn test_patch_rerun_skips_previous_patch() {
    let dir = setup_raiders();

    let first = patch_json(dir.path(), &[]);
    let second = patch_json(dir.path(), &["zPatch.jsonl"]);

    assert_eq!(
        first["report"]["patch_digest"],
        second["report"]["patch_digest"]
    );
}

#[test]
fn test_patch_missing_plugin_fails() {
    let dir = setup_raiders();

    cast_cmd(dir.path())
        .args(["patch", "Nope.jsonl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open plugin"));
}

#[test]
fn test_patch_malformed_plugin_fails() {
    let dir = setup_raiders();
    fs::write(dir.path().join("Broken.jsonl"), "{not json}\n").unwrap();

    cast_cmd(dir.path())
        .args(["patch", "Broken.jsonl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Broken.jsonl:1"));
    assert!(!dir.path().join("zPatch.jsonl").exists());
}

#[test]
fn test_patch_invalid_config_fails() {
    let dir = setup_raiders();
    write_config(dir.path(), "LCharRaider = 0");

    cast_cmd(dir.path())
        .args(["patch", "Base.jsonl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be at least 1"));
}

#[test]
fn test_patch_requires_plugins() {
    let dir = setup_raiders();

    cast_cmd(dir.path()).arg("patch").assert().failure();
}
