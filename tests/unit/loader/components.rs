use std::path::PathBuf;

use super::*;
use crate::fetch::registry::Fetcher;
use crate::request::model::ImageRequest;

#[derive(Debug)]
struct Named(&'static str);

impl FetcherFactory for Named {
    fn name(&self) -> &str {
        self.0
    }

    fn try_create(&self, _request: &ImageRequest) -> Option<Box<dyn Fetcher>> {
        None
    }
}

fn names<T: ?Sized>(list: &[Arc<T>], name: impl Fn(&T) -> &str) -> Vec<String> {
    list.iter().map(|c| name(c.as_ref()).to_owned()).collect()
}

#[test]
fn defaults_follow_pipeline_order() {
    let reg = ComponentRegistry::defaults(&LoaderConfig::default(), None, None);
    assert_eq!(names(reg.fetchers(), |f| f.name()), vec!["file", "data"]);
    assert_eq!(names(reg.decoders(), |d| d.name()), vec!["gif", "static"]);
    assert_eq!(
        names(reg.request_interceptors(), |r| r.name()),
        vec!["validate", "memory_cache", "engine"]
    );
    assert_eq!(
        names(reg.decode_interceptors(), |d| d.name()),
        vec![
            "result_cache",
            "transformation",
            "pixel_format",
            "resize",
            "engine"
        ]
    );
}

#[test]
fn optional_fetchers_join_when_configured() {
    let cfg = LoaderConfig {
        asset_root: Some(PathBuf::from("/assets")),
        ..LoaderConfig::default()
    };
    let reg = ComponentRegistry::defaults(&cfg, None, Some(Arc::new(ResourceBundle::new())));
    assert_eq!(
        names(reg.fetchers(), |f| f.name()),
        vec!["file", "asset", "resource", "data"]
    );
}

#[test]
fn request_level_entries_come_first() {
    let base = ComponentRegistry::defaults(&LoaderConfig::default(), None, None);
    let mut front = ComponentRegistry::new();
    front.add_fetcher(Arc::new(Named("custom")));

    let merged = ComponentRegistry::merged(Some(&front), &base);
    assert_eq!(
        names(merged.fetchers(), |f| f.name()),
        vec!["custom", "file", "data"]
    );
    assert_eq!(merged.decoders().len(), base.decoders().len());
    assert_eq!(merged.fetcher_registry().factories().len(), 3);

    let plain = ComponentRegistry::merged(None, &base);
    assert_eq!(plain.fetchers().len(), 2);
    assert!(ComponentRegistry::new().is_empty());
    assert!(!plain.is_empty());
}
