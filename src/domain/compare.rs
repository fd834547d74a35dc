use image::{DynamicImage, GenericImageView};

use super::RegionRect;

/// Decide whether two equally-sized rasters differ visibly.
///
/// Pixel-difference-sum strategy: sum of per-pixel absolute RGB channel
/// differences. A zero sum means the images are identical; otherwise the
/// images differ when the sum exceeds `threshold` (strictly), so a higher
/// threshold is less sensitive. Pure and symmetric in its two images.
///
/// Images of different dimensions cannot be compared pixelwise (the
/// snapshot usually predates a viewport change) and are treated as
/// changed.
pub fn differs(prior: &DynamicImage, current: &DynamicImage, threshold: u64) -> bool {
    if prior.dimensions() != current.dimensions() {
        return true;
    }
    match diff_sum(prior, current) {
        0 => false,
        sum => sum > threshold,
    }
}

/// Like [`differs`], restricted to a region-of-interest when one is given.
///
/// A malformed rectangle (right <= left or bottom <= top) is ignored and
/// the full frame is compared. A well-formed rectangle that does not fit
/// inside both images is treated as changed, since the region can no
/// longer be compared against the stored baseline.
pub fn differs_in_region(
    prior: &DynamicImage,
    current: &DynamicImage,
    threshold: u64,
    region: Option<RegionRect>,
) -> bool {
    match region {
        Some(r) if r.is_well_formed() => {
            if !contains(prior, r) || !contains(current, r) {
                return true;
            }
            let p = prior.crop_imm(r.left, r.top, r.width(), r.height());
            let c = current.crop_imm(r.left, r.top, r.width(), r.height());
            differs(&p, &c, threshold)
        }
        _ => differs(prior, current, threshold),
    }
}

fn contains(img: &DynamicImage, r: RegionRect) -> bool {
    let (w, h) = img.dimensions();
    r.right <= w && r.bottom <= h
}

/// Alpha is dropped before differencing so both images see the same color
/// normalization regardless of source format.
fn diff_sum(a: &DynamicImage, b: &DynamicImage) -> u64 {
    let a = a.to_rgb8();
    let b = b.to_rgb8();
    a.pixels()
        .zip(b.pixels())
        .map(|(pa, pb)| {
            pa.0.iter()
                .zip(pb.0.iter())
                .map(|(x, y)| u64::from(x.abs_diff(*y)))
                .sum::<u64>()
        })
        .sum()
}
