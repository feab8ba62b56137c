use super::*;
use crate::foundation::config::BufferPoolConfig;
use crate::foundation::core::PixelFormat;

fn numbered(w: u32, h: u32) -> Raster {
    let data = (0..w * h).map(|v| v as u8).collect::<Vec<_>>();
    Raster::from_vec(w, h, PixelFormat::L8, data).unwrap()
}

fn apply(t: &RotateTransformation, pool: &BufferPool, r: &Raster) -> Raster {
    t.transform(pool, r).unwrap().unwrap().raster
}

#[test]
fn quarter_turns_permute_pixels() {
    let pool = BufferPool::new(BufferPoolConfig::default());
    // 0 1 2
    // 3 4 5
    let src = numbered(3, 2);

    let r90 = apply(&RotateTransformation::new(90), &pool, &src);
    assert_eq!((r90.width(), r90.height()), (2, 3));
    assert_eq!(r90.data(), &[3, 0, 4, 1, 5, 2]);

    let r180 = apply(&RotateTransformation::new(180), &pool, &src);
    assert_eq!(r180.data(), &[5, 4, 3, 2, 1, 0]);

    let r270 = apply(&RotateTransformation::new(270), &pool, &src);
    assert_eq!((r270.width(), r270.height()), (2, 3));
    assert_eq!(r270.data(), &[2, 5, 1, 4, 0, 3]);
}

#[test]
fn full_turns_decline() {
    let pool = BufferPool::new(BufferPoolConfig::default());
    let src = numbered(2, 2);
    assert!(RotateTransformation::new(0).transform(&pool, &src).unwrap().is_none());
    assert!(RotateTransformation::new(360).transform(&pool, &src).unwrap().is_none());
    assert!(RotateTransformation::new(-720).transform(&pool, &src).unwrap().is_none());
}

#[test]
fn keys_and_tags_follow_normalized_angle() {
    let pool = BufferPool::new(BufferPoolConfig::default());
    let a = RotateTransformation::new(90);
    let b = RotateTransformation::new(450);
    assert_eq!(a.key(), "RotateTransformation(90)");
    assert_eq!(a.key(), b.key());
    assert_ne!(a.key(), RotateTransformation::new(180).key());
    assert_eq!(RotateTransformation::new(-90).degrees(), 270);

    let out = a.transform(&pool, &numbered(2, 2)).unwrap().unwrap();
    assert_eq!(out.transformed, "RotateTransformed(90)");
}

#[test]
fn arbitrary_angle_grows_canvas() {
    let pool = BufferPool::new(BufferPoolConfig::default());
    let src = Raster::from_vec(10, 10, PixelFormat::L8, vec![200; 100]).unwrap();
    let out = apply(&RotateTransformation::new(45), &pool, &src);
    assert_eq!((out.width(), out.height()), (14, 14));
    // Corners are outside the rotated square; the center is inside.
    assert_eq!(out.pixel(0, 0), &[0]);
    assert_eq!(out.pixel(7, 7), &[200]);
}

#[test]
fn input_is_left_untouched() {
    let pool = BufferPool::new(BufferPoolConfig::default());
    let src = numbered(3, 2);
    let _ = apply(&RotateTransformation::new(90), &pool, &src);
    assert_eq!(src.data(), &[0, 1, 2, 3, 4, 5]);
}
