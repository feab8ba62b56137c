use super::*;

#[test]
fn mime_parsing_is_case_insensitive_and_ignores_parameters() {
    assert_eq!(ImageFormat::from_mime_type("IMAGE/PNG"), Some(ImageFormat::Png));
    assert_eq!(
        ImageFormat::from_mime_type("image/jpeg; charset=binary"),
        Some(ImageFormat::Jpeg)
    );
    assert_eq!(ImageFormat::from_mime_type("image/jpg"), Some(ImageFormat::Jpeg));
    assert_eq!(ImageFormat::from_mime_type("text/html"), None);
}

#[test]
fn sniff_known_headers() {
    assert_eq!(ImageFormat::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageFormat::Jpeg));
    assert_eq!(ImageFormat::sniff(b"\x89PNG\r\n\x1a\n...."), Some(ImageFormat::Png));
    assert_eq!(ImageFormat::sniff(b"GIF89a......"), Some(ImageFormat::Gif));
    assert_eq!(ImageFormat::sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some(ImageFormat::Webp));
    assert_eq!(ImageFormat::sniff(b"\0\0\0\x18ftypheic"), Some(ImageFormat::Heic));
    assert_eq!(ImageFormat::sniff(b"\0\0\0\x18ftypmif1"), Some(ImageFormat::Heif));
    assert_eq!(ImageFormat::sniff(b"BM\0\0\0\0\0\0\0\0\0\0\0\0"), Some(ImageFormat::Bmp));
    assert_eq!(ImageFormat::sniff(b"hello"), None);
    assert_eq!(ImageFormat::sniff(&[]), None);
}

#[test]
fn mime_round_trips_through_canonical_name() {
    for f in [
        ImageFormat::Jpeg,
        ImageFormat::Png,
        ImageFormat::Webp,
        ImageFormat::Gif,
        ImageFormat::Bmp,
        ImageFormat::Heic,
        ImageFormat::Heif,
    ] {
        assert_eq!(ImageFormat::from_mime_type(f.mime_type()), Some(f));
    }
}

#[test]
fn generic_mime_types() {
    assert!(is_generic_mime_type("application/octet-stream"));
    assert!(is_generic_mime_type("image/*"));
    assert!(!is_generic_mime_type("image/png"));
}

#[test]
fn mime_from_path_extension() {
    assert_eq!(mime_type_from_path("/tmp/a.JPG").as_deref(), Some("image/jpeg"));
    assert_eq!(mime_type_from_path("icons/x.png").as_deref(), Some("image/png"));
    assert_eq!(mime_type_from_path("/tmp/noext"), None);
    assert_eq!(mime_type_from_path("/tmp.d/noext"), None);
}
