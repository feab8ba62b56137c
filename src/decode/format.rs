/// Image container formats the loader knows how to name and sniff.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ImageFormat {
    /// JPEG / JFIF.
    Jpeg,
    /// PNG.
    Png,
    /// WebP.
    Webp,
    /// GIF, possibly animated.
    Gif,
    /// Windows bitmap.
    Bmp,
    /// HEIC (HEVC in HEIF).
    Heic,
    /// Generic HEIF.
    Heif,
}

/// Header bytes needed by [`ImageFormat::sniff`].
pub const SNIFF_LEN: usize = 32;

impl ImageFormat {
    /// Canonical mime type.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Heic => "image/heic",
            Self::Heif => "image/heif",
        }
    }

    /// Parse a mime type. Case-insensitive; parameters after `;` are ignored.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" | "image/x-png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            "image/gif" => Some(Self::Gif),
            "image/bmp" | "image/x-ms-bmp" | "image/x-bmp" => Some(Self::Bmp),
            "image/heic" | "image/heic-sequence" => Some(Self::Heic),
            "image/heif" | "image/heif-sequence" => Some(Self::Heif),
            _ => None,
        }
    }

    /// Guess from a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "jpe" | "jfif" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            "gif" => Some(Self::Gif),
            "bmp" | "dib" => Some(Self::Bmp),
            "heic" => Some(Self::Heic),
            "heif" => Some(Self::Heif),
            _ => None,
        }
    }

    /// Identify a format from leading bytes.
    pub fn sniff(header: &[u8]) -> Option<Self> {
        if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        if header.starts_with(b"\x89PNG\r\n\x1a\n") {
            return Some(Self::Png);
        }
        if header.starts_with(b"GIF87a") || header.starts_with(b"GIF89a") {
            return Some(Self::Gif);
        }
        if header.len() >= 12 && &header[..4] == b"RIFF" && &header[8..12] == b"WEBP" {
            return Some(Self::Webp);
        }
        if header.len() >= 12 && &header[4..8] == b"ftyp" {
            return match &header[8..12] {
                b"heic" | b"heix" | b"hevc" | b"hevx" => Some(Self::Heic),
                b"mif1" | b"msf1" | b"heim" | b"heis" => Some(Self::Heif),
                _ => None,
            };
        }
        if header.starts_with(b"BM") && header.len() >= 14 {
            return Some(Self::Bmp);
        }
        None
    }

    /// `true` for formats that may carry several frames.
    pub fn may_be_animated(self) -> bool {
        matches!(self, Self::Gif | Self::Webp)
    }

    /// Matching `image` crate format, when that crate can decode it.
    pub(crate) fn to_codec(self) -> Option<image::ImageFormat> {
        match self {
            Self::Jpeg => Some(image::ImageFormat::Jpeg),
            Self::Png => Some(image::ImageFormat::Png),
            Self::Webp => Some(image::ImageFormat::WebP),
            Self::Gif => Some(image::ImageFormat::Gif),
            Self::Bmp => Some(image::ImageFormat::Bmp),
            Self::Heic | Self::Heif => None,
        }
    }

    pub(crate) fn from_codec(codec: image::ImageFormat) -> Option<Self> {
        match codec {
            image::ImageFormat::Jpeg => Some(Self::Jpeg),
            image::ImageFormat::Png => Some(Self::Png),
            image::ImageFormat::WebP => Some(Self::Webp),
            image::ImageFormat::Gif => Some(Self::Gif),
            image::ImageFormat::Bmp => Some(Self::Bmp),
            _ => None,
        }
    }
}

/// `true` when a declared mime type says nothing useful about the bytes.
pub fn is_generic_mime_type(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    matches!(
        essence.as_str(),
        "" | "application/octet-stream" | "binary/octet-stream" | "image/*" | "*/*"
    )
}

/// Mime type guessed from the extension of a path-like string.
pub fn mime_type_from_path(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = name.rsplit_once('.')?;
    ImageFormat::from_extension(ext).map(|f| f.mime_type().to_string())
}

#[cfg(test)]
#[path = "../../tests/unit/decode/format.rs"]
mod tests;
