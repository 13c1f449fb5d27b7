use crate::error::{Error, Result};
use crate::pair::clipping::Polygon;
use crate::pair::{BBox, Ltrb, Ltwh, RotatedBBox};

fn checked_ltrb(bbox: &BBox<Ltwh>) -> Result<BBox<Ltrb>> {
    let ltrb = bbox.as_ltrb();

    if !ltrb.is_proper() {
        return Err(Error::DegenerateBox(format!(
            "{:?} has non-positive width or height", bbox.to_array()
        )));
    }

    Ok(ltrb)
}

#[inline]
fn area(b: &BBox<Ltrb>) -> f64 {
    (b.right() - b.left()) as f64 * (b.bottom() - b.top()) as f64
}

fn checked_ratio(intersection: f64, union: f64) -> Result<f32> {
    if !(union > 0.0 && union.is_finite()) {
        return Err(Error::Internal(format!("union area {} is not positive", union)));
    }

    let iou = intersection / union;

    // inter <= min(area) so only NaN or overflow can land here
    if !(0.0..=1.0).contains(&iou) {
        return Err(Error::Internal(format!("iou {} outside [0, 1]", iou)));
    }

    Ok(iou as f32)
}

/// Computes intersection over union of two axis-aligned boxes.
///
/// Boxes are given as `(top left x, top left y, width, height)` and must have
/// positive width and height, otherwise `Error::DegenerateBox` is returned.
/// Disjoint boxes give `0.0`.
pub fn iou(bbox: &BBox<Ltwh>, candidate: &BBox<Ltwh>) -> Result<f32> {
    let b1 = checked_ltrb(bbox)?;
    let b2 = checked_ltrb(candidate)?;

    let i_xmin = b1.left().max(b2.left());
    let i_ymin = b1.top().max(b2.top());

    let i_xmax = b1.right().min(b2.right());
    let i_ymax = b1.bottom().min(b2.bottom());

    let intersection_area = if i_xmax < i_xmin || i_ymax < i_ymin {
        0.0
    } else {
        (i_xmax - i_xmin) as f64 * (i_ymax - i_ymin) as f64
    };

    let union_area = area(&b1) + area(&b2) - intersection_area;

    checked_ratio(intersection_area, union_area)
}

/// Computes intersection over union of two rotated boxes.
///
/// Each box is turned about its own centre by its angle (see
/// `Polygon::from_rotated` for the direction) and the overlap is found by
/// polygon clipping. The inputs do not need to be normalized: a box and its
/// normalized form cover the same region.
pub fn iou_rotated(bbox: &RotatedBBox, candidate: &RotatedBBox) -> Result<f32> {
    checked_ltrb(&bbox.bbox)?;
    checked_ltrb(&candidate.bbox)?;

    let a = Polygon::from_rotated(bbox);
    let b = Polygon::from_rotated(candidate);

    let (area_a, area_b) = (a.area(), b.area());

    // coincident edges can leave a rounding sliver above the smaller area
    let intersection_area = a.intersection_area(&b).min(area_a.min(area_b));
    let union_area = area_a + area_b - intersection_area;

    checked_ratio(intersection_area, union_area)
}
