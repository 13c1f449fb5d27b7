use crate::pair::{BBox, Ltwh};

/// A rectangle given as its unrotated `(left, top, width, height)` footprint
/// plus a rotation `angle` in degrees about the footprint's centre.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RotatedBBox {
    pub bbox: BBox<Ltwh>,
    pub angle: f32,
}

impl RotatedBBox {
    #[inline]
    pub fn new(left: f32, top: f32, width: f32, height: f32, angle: f32) -> Self {
        Self {
            bbox: BBox::ltwh(left, top, width, height),
            angle,
        }
    }

    #[inline]
    pub fn upright(bbox: BBox<Ltwh>) -> Self {
        Self { bbox, angle: 0.0 }
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.bbox.width()
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.bbox.height()
    }

    #[inline]
    pub fn to_array(&self) -> [f32; 5] {
        let [l, t, w, h] = self.bbox.to_array();

        [l, t, w, h, self.angle]
    }

    /// Canonical form of the box: the long side becomes the height and the
    /// angle is wrapped into `(-90, 90]`.
    ///
    /// A box wider than tall is swapped once (width and height exchanged
    /// around the fixed centre, angle + 90). The result always has
    /// `width <= height`, so normalizing it again is a no-op.
    pub fn normalized(&self) -> Self {
        let [mut left, mut top, mut width, mut height] = self.bbox.to_array();
        let mut angle = self.angle;

        if width > height {
            let [cx, cy] = self.bbox.center();

            std::mem::swap(&mut width, &mut height);
            angle += 90.0;

            left = cx - width / 2.0;
            top = cy - height / 2.0;
        }

        Self::new(left, top, width, height, wrap_angle(angle))
    }
}

/// Wraps degrees into `(-90, 90]` in steps of 180.
///
/// Same result as subtracting 180 while the angle is above 90 and adding 180
/// while it is at or below -90, without looping on large inputs.
#[inline]
pub fn wrap_angle(angle: f32) -> f32 {
    if angle > -90.0 && angle <= 90.0 {
        return angle;
    }

    let wrapped = 90.0 - (90.0 - angle).rem_euclid(180.0);

    // rem_euclid may round up to exactly 180 for inputs a hair above 90
    if wrapped <= -90.0 {
        wrapped + 180.0
    } else {
        wrapped
    }
}
