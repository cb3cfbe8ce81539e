//! Integration tests for Checkpoint
//!
//! Tests extracted from src/engine/checkpoint.rs

use std::fs;
use std::path::PathBuf;

use crashmatch::engine::Checkpoint;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("crashmatch-checkpoint-{}-{}", std::process::id(), name))
}

#[test]
fn test_missing_file_loads_empty() {
    let path = temp_path("missing.json");
    let checkpoint = Checkpoint::load(&path).unwrap();
    assert!(checkpoint.is_empty());
}

#[test]
fn test_save_and_reload() {
    let path = temp_path("roundtrip.json");
    let mut checkpoint = Checkpoint::new();
    checkpoint.mark_done("trips_2024_01.csv");
    checkpoint.mark_done("trips_2024_02.csv");
    checkpoint.save(&path).unwrap();

    let reloaded = Checkpoint::load(&path).unwrap();
    assert_eq!(reloaded, checkpoint);
    assert!(reloaded.is_done("trips_2024_01.csv"));
    assert!(!reloaded.is_done("trips_2024_03.csv"));

    let _ = fs::remove_file(&path);
}

#[test]
fn test_mark_done_is_idempotent() {
    let mut checkpoint = Checkpoint::new();
    assert!(checkpoint.mark_done("a.csv"), "first mark is new");
    assert!(!checkpoint.mark_done("a.csv"), "second mark is a no-op");
    assert_eq!(checkpoint.len(), 1);
}

#[test]
fn test_completed_is_sorted() {
    let mut checkpoint = Checkpoint::new();
    checkpoint.mark_done("b.csv");
    checkpoint.mark_done("a.csv");
    checkpoint.mark_done("c.csv");

    let order: Vec<&str> = checkpoint.completed().map(String::as_str).collect();
    assert_eq!(order, vec!["a.csv", "b.csv", "c.csv"]);
}

#[test]
fn test_corrupt_file_is_an_error() {
    let path = temp_path("corrupt.json");
    fs::write(&path, "not json at all {").unwrap();

    assert!(Checkpoint::load(&path).is_err());

    let _ = fs::remove_file(&path);
}

#[test]
fn test_save_overwrites_previous_state() {
    let path = temp_path("overwrite.json");

    let mut first = Checkpoint::new();
    first.mark_done("a.csv");
    first.save(&path).unwrap();

    let mut second = Checkpoint::load(&path).unwrap();
    second.mark_done("b.csv");
    second.save(&path).unwrap();

    let reloaded = Checkpoint::load(&path).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert!(reloaded.is_done("a.csv") && reloaded.is_done("b.csv"));

    let _ = fs::remove_file(&path);
}
