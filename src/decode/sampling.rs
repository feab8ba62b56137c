use crate::decode::format::ImageFormat;
use crate::foundation::core::Size;

const MAX_SAMPLE_SIZE: u32 = 1 << 16;

/// Size a decoder produces for `src` at power-of-two `sample_size`.
///
/// PNG decoders drop the partial last block (round down); the others keep it (round up).
pub fn sampled_size(src: Size, sample_size: u32, format: Option<ImageFormat>) -> Size {
    let s = sample_size.max(1);
    let div = |v: u32| match format {
        Some(ImageFormat::Png) => (v / s).max(1),
        _ => v.div_ceil(s).max(1),
    };
    Size::new(div(src.width), div(src.height))
}

/// Largest power-of-two sample size that keeps the decoded size at or above `target` in both
/// dimensions, then grown until neither side exceeds `max_bitmap_size`.
pub fn calculate_sample_size(
    src: Size,
    target: Option<Size>,
    max_bitmap_size: u32,
    format: Option<ImageFormat>,
) -> u32 {
    if src.is_empty() {
        return 1;
    }
    let mut s = 1u32;
    if let Some(t) = target
        && !t.is_empty()
    {
        while s < MAX_SAMPLE_SIZE {
            let next = sampled_size(src, s * 2, format);
            if next.width < t.width || next.height < t.height || next == sampled_size(src, s, format)
            {
                break;
            }
            s *= 2;
        }
    }
    let limit = max_bitmap_size.max(1);
    while s < MAX_SAMPLE_SIZE {
        let now = sampled_size(src, s, format);
        if now.width <= limit && now.height <= limit {
            break;
        }
        s *= 2;
    }
    s
}

#[cfg(test)]
#[path = "../../tests/unit/decode/sampling.rs"]
mod tests;
