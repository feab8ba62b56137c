use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::foundation::core::DataFrom;
use crate::foundation::error::{LoomError, LoomResult};
use crate::source::data_source::DataSource;

/// Bytes of a local file.
#[derive(Debug, Clone)]
pub struct FileDataSource {
    uri: String,
    path: PathBuf,
}

impl FileDataSource {
    /// Source over `path`, reported under `uri`.
    pub fn new(uri: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            uri: uri.into(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_file(path: &Path) -> LoomResult<File> {
    File::open(path)
        .map_err(|e| LoomError::source_unavailable(format!("open '{}': {e}", path.display())))
}

fn file_len(path: &Path) -> LoomResult<u64> {
    let meta = std::fs::metadata(path)
        .map_err(|e| LoomError::source_unavailable(format!("stat '{}': {e}", path.display())))?;
    if !meta.is_file() {
        return Err(LoomError::source_unavailable(format!(
            "'{}' is not a regular file",
            path.display()
        )));
    }
    Ok(meta.len())
}

impl DataSource for FileDataSource {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn data_from(&self) -> DataFrom {
        DataFrom::Local
    }

    fn length(&self) -> LoomResult<u64> {
        file_len(&self.path)
    }

    fn open(&self) -> LoomResult<Box<dyn Read + Send>> {
        Ok(Box::new(open_file(&self.path)?))
    }

    fn local_path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// File under the configured asset root.
#[derive(Debug, Clone)]
pub struct AssetDataSource {
    uri: String,
    path: PathBuf,
}

impl AssetDataSource {
    /// Resolve `relative` under `root`. Absolute paths and `..` components are rejected.
    pub fn new(uri: impl Into<String>, root: &Path, relative: &str) -> LoomResult<Self> {
        let rel = Path::new(relative);
        if relative.is_empty()
            || rel
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(LoomError::validation(format!(
                "asset path '{relative}' must be a relative path without '..'"
            )));
        }
        Ok(Self {
            uri: uri.into(),
            path: root.join(rel),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSource for AssetDataSource {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn data_from(&self) -> DataFrom {
        DataFrom::Local
    }

    fn length(&self) -> LoomResult<u64> {
        file_len(&self.path)
    }

    fn open(&self) -> LoomResult<Box<dyn Read + Send>> {
        Ok(Box::new(open_file(&self.path)?))
    }

    fn local_path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// In-memory bytes (`data:` identifiers, packaged resources).
#[derive(Debug, Clone)]
pub struct ByteArrayDataSource {
    uri: String,
    bytes: Arc<[u8]>,
    from: DataFrom,
}

impl ByteArrayDataSource {
    /// Wrap `bytes` with the given origin tier.
    pub fn new(uri: impl Into<String>, bytes: impl Into<Arc<[u8]>>, from: DataFrom) -> Self {
        Self {
            uri: uri.into(),
            bytes: bytes.into(),
            from,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl DataSource for ByteArrayDataSource {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn data_from(&self) -> DataFrom {
        self.from
    }

    fn length(&self) -> LoomResult<u64> {
        Ok(self.bytes.len() as u64)
    }

    fn open(&self) -> LoomResult<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.bytes.clone())))
    }

    fn should_materialize(&self) -> bool {
        false
    }

    fn read_all(&self) -> LoomResult<Vec<u8>> {
        Ok(self.bytes.to_vec())
    }
}

/// External provider behind `content://` identifiers.
pub trait ContentResolver: Send + Sync {
    /// Declared mime type of the content, if the provider knows it.
    fn mime_type(&self, uri: &str) -> Option<String>;

    /// Byte length of the content.
    fn length(&self, uri: &str) -> LoomResult<u64>;

    /// Fresh stream over the content.
    fn open(&self, uri: &str) -> LoomResult<Box<dyn Read + Send>>;
}

/// Bytes served by a [`ContentResolver`].
#[derive(Clone)]
pub struct ContentDataSource {
    uri: String,
    resolver: Arc<dyn ContentResolver>,
}

impl std::fmt::Debug for ContentDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentDataSource")
            .field("uri", &self.uri)
            .finish_non_exhaustive()
    }
}

impl ContentDataSource {
    /// Source over `uri`, answered by `resolver`.
    pub fn new(uri: impl Into<String>, resolver: Arc<dyn ContentResolver>) -> Self {
        Self {
            uri: uri.into(),
            resolver,
        }
    }
}

impl DataSource for ContentDataSource {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn data_from(&self) -> DataFrom {
        DataFrom::Local
    }

    fn length(&self) -> LoomResult<u64> {
        self.resolver.length(&self.uri)
    }

    fn open(&self) -> LoomResult<Box<dyn Read + Send>> {
        self.resolver.open(&self.uri)
    }
}

#[derive(Debug, Clone)]
struct Resource {
    bytes: Arc<[u8]>,
    mime_type: Option<String>,
}

/// Named in-memory resources behind `res://` identifiers.
#[derive(Debug, Clone, Default)]
pub struct ResourceBundle {
    entries: HashMap<String, Resource>,
}

impl ResourceBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a resource.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
        mime_type: Option<&str>,
    ) {
        self.entries.insert(
            name.into(),
            Resource {
                bytes: bytes.into(),
                mime_type: mime_type.map(str::to_string),
            },
        );
    }

    /// Bytes and declared mime type of `name`.
    pub fn get(&self, name: &str) -> Option<(Arc<[u8]>, Option<&str>)> {
        self.entries
            .get(name)
            .map(|r| (r.bytes.clone(), r.mime_type.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/source/sources.rs"]
mod tests;
