use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine as _;

use crate::decode::format::mime_type_from_path;
use crate::fetch::registry::{FetchResult, Fetcher, FetcherFactory};
use crate::foundation::core::DataFrom;
use crate::foundation::error::{LoomError, LoomResult};
use crate::request::model::ImageRequest;
use crate::source::data_source::DataSource;
use crate::source::sources::{
    AssetDataSource, ByteArrayDataSource, ContentDataSource, ContentResolver, FileDataSource,
    ResourceBundle,
};

/// Fetcher wrapping a deferred closure.
struct FnFetcher<F>(F);

impl<F> Fetcher for FnFetcher<F>
where
    F: FnOnce() -> LoomResult<FetchResult> + Send,
{
    fn fetch(self: Box<Self>) -> LoomResult<FetchResult> {
        (self.0)()
    }
}

fn bind<F>(f: F) -> Option<Box<dyn Fetcher>>
where
    F: FnOnce() -> LoomResult<FetchResult> + Send + 'static,
{
    Some(Box::new(FnFetcher(f)))
}

/// Scheme (lowercased) and remainder of `uri`, when it has one.
pub(crate) fn split_scheme(uri: &str) -> Option<(String, &str)> {
    let (scheme, rest) = uri.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic()
        || scheme.len() < 2
        || !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        return None;
    }
    Some((scheme.to_ascii_lowercase(), rest))
}

/// Decode `%XX` escapes. `None` on a malformed escape.
pub(crate) fn percent_decode(s: &str) -> Option<Vec<u8>> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            let hex = std::str::from_utf8(hex).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Some(out)
}

fn source_exists(source: &dyn DataSource) -> LoomResult<()> {
    source.length().map(|_| ())
}

/// `file://` identifiers and bare absolute paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileFetcherFactory;

impl FileFetcherFactory {
    fn local_path(uri: &str) -> Option<String> {
        if uri.starts_with('/') {
            return Some(uri.to_string());
        }
        let (scheme, rest) = split_scheme(uri)?;
        if scheme != "file" {
            return None;
        }
        let rest = rest.strip_prefix("//")?;
        let path = match rest.find('/') {
            Some(0) => rest,
            Some(at) if &rest[..at] == "localhost" => &rest[at..],
            _ => return None,
        };
        let path = path.split(['?', '#']).next().unwrap_or(path);
        String::from_utf8(percent_decode(path)?).ok()
    }
}

impl FetcherFactory for FileFetcherFactory {
    fn name(&self) -> &str {
        "file"
    }

    fn try_create(&self, request: &ImageRequest) -> Option<Box<dyn Fetcher>> {
        let path = Self::local_path(request.uri())?;
        let uri = request.uri().to_string();
        bind(move || {
            let mime = mime_type_from_path(&path);
            let source = FileDataSource::new(uri, PathBuf::from(path));
            source_exists(&source)?;
            Ok(FetchResult::new(Arc::new(source), mime))
        })
    }
}

/// `asset://relative/path` identifiers under a root directory.
#[derive(Debug, Clone)]
pub struct AssetFetcherFactory {
    root: PathBuf,
}

impl AssetFetcherFactory {
    /// Serve assets from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FetcherFactory for AssetFetcherFactory {
    fn name(&self) -> &str {
        "asset"
    }

    fn try_create(&self, request: &ImageRequest) -> Option<Box<dyn Fetcher>> {
        let (scheme, rest) = split_scheme(request.uri())?;
        if scheme != "asset" {
            return None;
        }
        let relative = rest.trim_start_matches('/').to_string();
        let uri = request.uri().to_string();
        let root = self.root.clone();
        bind(move || {
            let source = AssetDataSource::new(uri, &root, &relative)?;
            source_exists(&source)?;
            Ok(FetchResult::new(Arc::new(source), mime_type_from_path(&relative)))
        })
    }
}

/// `content://` identifiers answered by a [`ContentResolver`].
#[derive(Clone)]
pub struct ContentFetcherFactory {
    resolver: Arc<dyn ContentResolver>,
}

impl ContentFetcherFactory {
    /// Use `resolver` for every content identifier.
    pub fn new(resolver: Arc<dyn ContentResolver>) -> Self {
        Self { resolver }
    }
}

impl FetcherFactory for ContentFetcherFactory {
    fn name(&self) -> &str {
        "content"
    }

    fn try_create(&self, request: &ImageRequest) -> Option<Box<dyn Fetcher>> {
        let (scheme, _) = split_scheme(request.uri())?;
        if scheme != "content" {
            return None;
        }
        let uri = request.uri().to_string();
        let resolver = self.resolver.clone();
        bind(move || {
            let mime = resolver.mime_type(&uri);
            let source = ContentDataSource::new(uri, resolver);
            Ok(FetchResult::new(Arc::new(source), mime))
        })
    }
}

/// `res://name` identifiers looked up in a [`ResourceBundle`].
#[derive(Debug, Clone)]
pub struct ResourceFetcherFactory {
    bundle: Arc<ResourceBundle>,
}

impl ResourceFetcherFactory {
    /// Serve resources from `bundle`.
    pub fn new(bundle: Arc<ResourceBundle>) -> Self {
        Self { bundle }
    }
}

impl FetcherFactory for ResourceFetcherFactory {
    fn name(&self) -> &str {
        "resource"
    }

    fn try_create(&self, request: &ImageRequest) -> Option<Box<dyn Fetcher>> {
        let (scheme, rest) = split_scheme(request.uri())?;
        if scheme != "res" {
            return None;
        }
        let name = rest.trim_start_matches('/').to_string();
        let uri = request.uri().to_string();
        let bundle = self.bundle.clone();
        bind(move || {
            let (bytes, mime) = bundle.get(&name).ok_or_else(|| {
                LoomError::source_unavailable(format!("no packaged resource named '{name}'"))
            })?;
            let mime = mime.map(str::to_string).or_else(|| mime_type_from_path(&name));
            let source = ByteArrayDataSource::new(uri, bytes, DataFrom::Memory);
            Ok(FetchResult::new(Arc::new(source), mime))
        })
    }
}

/// `data:[<mime>][;base64],<payload>` identifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataUriFetcherFactory;

/// Split a data URI into its declared mime type and payload bytes.
pub(crate) fn parse_data_uri(uri: &str) -> LoomResult<(Option<String>, Vec<u8>)> {
    let body = uri
        .split_once(':')
        .map(|(_, rest)| rest)
        .ok_or_else(|| LoomError::source_unavailable("data uri without ':'"))?;
    let (header, payload) = body
        .split_once(',')
        .ok_or_else(|| LoomError::source_unavailable("data uri without ','"))?;
    let mut fields = header.split(';');
    let mime = fields
        .next()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string);
    let is_base64 = fields.any(|f| f.trim().eq_ignore_ascii_case("base64"));

    let bytes = if is_base64 {
        let compact = payload
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect::<String>();
        base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| LoomError::source_unavailable(format!("invalid base64 in data uri: {e}")))?
    } else {
        percent_decode(payload)
            .ok_or_else(|| LoomError::source_unavailable("invalid escape in data uri"))?
    };
    Ok((mime, bytes))
}

impl FetcherFactory for DataUriFetcherFactory {
    fn name(&self) -> &str {
        "data"
    }

    fn try_create(&self, request: &ImageRequest) -> Option<Box<dyn Fetcher>> {
        let (scheme, _) = split_scheme(request.uri())?;
        if scheme != "data" {
            return None;
        }
        let uri = request.uri().to_string();
        bind(move || {
            let (mime, bytes) = parse_data_uri(&uri)?;
            let source = ByteArrayDataSource::new(uri, bytes, DataFrom::Memory);
            Ok(FetchResult::new(Arc::new(source), mime))
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/fetch/fetchers.rs"]
mod tests;
