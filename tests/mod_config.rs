use bookstore::config::{AppConfig, OutputFormat, load_layers};
use bookstore::errors::DbError;
use std::collections::HashMap;
use std::path::PathBuf;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
    move |k: &str| map.get(k).cloned()
}

fn write_toml(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
    let p = dir.path().join(name);
    std::fs::write(&p, body).unwrap();
    p
}

#[test]
fn file_values_fill_unset_fields() {
    let tmp = tempfile::tempdir().unwrap();
    let p = write_toml(&tmp, "bookstore.toml", "database = \"shop\"\npage_size = 3\nformat = \"pretty\"\n");
    let cfg = load_layers(AppConfig::default(), None, &[p], &env(&[])).unwrap();
    assert_eq!(cfg.database(), "shop");
    assert_eq!(cfg.collection(), "books");
    assert_eq!(cfg.page_size(), 3);
    assert_eq!(cfg.format(), OutputFormat::Pretty);
}

#[test]
fn cli_beats_env_beats_file() {
    let tmp = tempfile::tempdir().unwrap();
    let p = write_toml(&tmp, "a.toml", "database = \"from_file\"\ncollection = \"file_books\"\npage_size = 7\n");
    let lookup = env(&[("BOOKSTORE_DATABASE", "from_env"), ("BOOKSTORE_PAGE_SIZE", "4")]);
    let cli = AppConfig { page_size: Some(2), ..AppConfig::default() };
    let cfg = load_layers(cli, None, &[p], &lookup).unwrap();
    assert_eq!(cfg.database(), "from_env");
    assert_eq!(cfg.collection(), "file_books");
    assert_eq!(cfg.page_size(), 2);
}

#[test]
fn earlier_files_win() {
    let tmp = tempfile::tempdir().unwrap();
    let first = write_toml(&tmp, "first.toml", "collection = \"first\"\n");
    let second = write_toml(&tmp, "second.toml", "collection = \"second\"\nlog_level = \"debug\"\n");
    let cfg = load_layers(AppConfig::default(), None, &[first, second], &env(&[])).unwrap();
    assert_eq!(cfg.collection(), "first");
    assert_eq!(cfg.log_level(), "debug");
}

#[test]
fn broken_implicit_file_is_skipped_but_explicit_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let bad = write_toml(&tmp, "bad.toml", "page_size = \"many\"\n");
    let missing = tmp.path().join("missing.toml");
    let cfg = load_layers(AppConfig::default(), None, &[bad.clone(), missing], &env(&[])).unwrap();
    assert_eq!(cfg.page_size(), 5);
    assert!(matches!(
        load_layers(AppConfig::default(), Some(&bad), std::slice::from_ref(&bad), &env(&[])),
        Err(DbError::Config(_))
    ));
}

#[test]
fn unknown_keys_are_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let p = write_toml(&tmp, "x.toml", "colection = \"typo\"\n");
    assert!(AppConfig::from_file(&p).is_err());
}

#[test]
fn bad_env_page_size_is_an_error() {
    let lookup = env(&[("BOOKSTORE_PAGE_SIZE", "ten")]);
    assert!(matches!(load_layers(AppConfig::default(), None, &[], &lookup), Err(DbError::Config(_))));
}
