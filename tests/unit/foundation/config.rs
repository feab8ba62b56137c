use super::*;

#[test]
fn empty_document_uses_defaults() {
    let cfg = LoaderConfig::from_json_str("{}").unwrap();
    assert_eq!(cfg, LoaderConfig::default());
    assert!(cfg.disk_cache.is_none());
    assert!(cfg.result_cache.is_none());
}

#[test]
fn cache_sections_parse_with_default_budget() {
    let cfg = LoaderConfig::from_json_str(
        r#"{
            "disk_cache": { "dir": "/tmp/loom-data" },
            "result_cache": { "dir": "/tmp/loom-result", "max_bytes": 1024 },
            "worker_threads": 2,
            "default_max_size": { "width": 800, "height": 600 }
        }"#,
    )
    .unwrap();
    let disk = cfg.disk_cache.unwrap();
    assert_eq!(disk.dir, PathBuf::from("/tmp/loom-data"));
    assert_eq!(disk.max_bytes, 256 * 1024 * 1024);
    assert_eq!(cfg.result_cache.unwrap().max_bytes, 1024);
    assert_eq!(cfg.worker_threads, Some(2));
    assert_eq!(cfg.default_max_size, Some(Size::new(800, 600)));
}

#[test]
fn invalid_values_are_rejected() {
    let err = LoaderConfig::from_json_str(r#"{ "worker_threads": 0 }"#).unwrap_err();
    assert!(err.to_string().contains("worker_threads"));

    let err = LoaderConfig::from_json_str(r#"{ "disk_cache": { "dir": "x", "max_bytes": 0 } }"#)
        .unwrap_err();
    assert!(err.to_string().contains("disk_cache.max_bytes"));

    let err = LoaderConfig::from_json_str("not json").unwrap_err();
    assert!(matches!(err, LoomError::Validation(_)));
}

#[test]
fn from_json_path_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("loader.json");
    std::fs::write(&path, r#"{ "memory_cache_max_bytes": 0 }"#).unwrap();
    let cfg = LoaderConfig::from_json_path(&path).unwrap();
    assert_eq!(cfg.memory_cache_max_bytes, 0);

    assert!(LoaderConfig::from_json_path(dir.path().join("missing.json")).is_err());
}

#[test]
fn cache_tiers_need_distinct_directories() {
    let err = LoaderConfig::from_json_str(
        r#"{ "disk_cache": { "dir": "/tmp/loom" }, "result_cache": { "dir": "/tmp/loom" } }"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("different directories"));
}
