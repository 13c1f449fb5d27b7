use std::convert::TryFrom;

use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use crate::pair::{BBox, Ltwh, RotatedBBox};

/// Box of a detection: four numbers `(x, y, w, h)` for an axis-aligned box,
/// five numbers `(x, y, w, h, angle)` for a rotated one.
///
/// `(x, y)` is the top left corner of the unrotated footprint, angles are in
/// degrees.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub enum DetectionBox {
    Upright(BBox<Ltwh>),
    Rotated(RotatedBBox),
}

impl DetectionBox {
    #[inline]
    pub fn upright(left: f32, top: f32, width: f32, height: f32) -> Self {
        DetectionBox::Upright(BBox::ltwh(left, top, width, height))
    }

    #[inline]
    pub fn rotated(left: f32, top: f32, width: f32, height: f32, angle: f32) -> Self {
        DetectionBox::Rotated(RotatedBBox::new(left, top, width, height, angle))
    }

    /// Unrotated footprint of the box.
    #[inline]
    pub fn ltwh(&self) -> BBox<Ltwh> {
        match self {
            DetectionBox::Upright(bbox) => *bbox,
            DetectionBox::Rotated(rbox) => rbox.bbox,
        }
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.ltwh().width()
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.ltwh().height()
    }

    /// Rotation in degrees, `None` for a four-number box.
    #[inline]
    pub fn angle(&self) -> Option<f32> {
        match self {
            DetectionBox::Upright(_) => None,
            DetectionBox::Rotated(rbox) => Some(rbox.angle),
        }
    }

    #[inline]
    pub fn as_rotated(&self) -> Option<RotatedBBox> {
        match self {
            DetectionBox::Upright(_) => None,
            DetectionBox::Rotated(rbox) => Some(*rbox),
        }
    }

    /// Rotated boxes go through `RotatedBBox::normalized`; upright boxes are
    /// returned unchanged.
    #[inline]
    pub fn normalized(&self) -> Self {
        match self {
            DetectionBox::Upright(bbox) => DetectionBox::Upright(*bbox),
            DetectionBox::Rotated(rbox) => DetectionBox::Rotated(rbox.normalized()),
        }
    }
}

impl TryFrom<Vec<f32>> for DetectionBox {
    type Error = String;

    fn try_from(v: Vec<f32>) -> Result<Self, Self::Error> {
        match v.as_slice() {
            &[l, t, w, h] => Ok(DetectionBox::upright(l, t, w, h)),
            &[l, t, w, h, a] => Ok(DetectionBox::rotated(l, t, w, h, a)),
            other => Err(format!("bbox must have 4 or 5 values, got {}", other.len())),
        }
    }
}

impl From<DetectionBox> for Vec<f32> {
    fn from(b: DetectionBox) -> Self {
        match b {
            DetectionBox::Upright(bbox) => bbox.to_array().to_vec(),
            DetectionBox::Rotated(rbox) => rbox.to_array().to_vec(),
        }
    }
}

///
/// A single detection of one frame.
///
/// bbox : DetectionBox - axis-aligned or rotated box.
/// bbox_center : Option<[f32; 2]> - corrected centre supplied by the producer,
///     which may differ from the geometric centre of `bbox`.
/// embedding : Option<Array1<f32>> - appearance descriptor.
/// confidence : f32 - detector confidence score.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: DetectionBox,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox_center: Option<[f32; 2]>,

    #[serde(rename = "emb", alias = "embedding", default, skip_serializing_if = "Option::is_none", with = "embedding_serde")]
    pub embedding: Option<Array1<f32>>,

    #[serde(rename = "score", alias = "confidence", default)]
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: DetectionBox) -> Self {
        Self {
            bbox,
            bbox_center: None,
            embedding: None,
            confidence: 0.0,
        }
    }

    pub fn with_center(mut self, x: f32, y: f32) -> Self {
        self.bbox_center = Some([x, y]);
        self
    }

    pub fn with_embedding(mut self, embedding: Array1<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }
}

mod embedding_serde {
    use ndarray::Array1;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Array1<f32>>, s: S) -> Result<S::Ok, S::Error> {
        v.as_ref().map(|a| a.to_vec()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Array1<f32>>, D::Error> {
        Ok(Option::<Vec<f32>>::deserialize(d)?.map(Array1::from))
    }
}
