use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pair::descriptor::{cosine_similarity, euclidean_distance};
use crate::pair::iou::{iou, iou_rotated};
use crate::pair::Detection;

/// Similarity signals between two detections. Declaration order is the
/// canonical order of a `FeatureSet`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// `min(w1, w2) / max(w1, w2)`, in `(0, 1]`.
    WidthRel,
    /// `min(h1, h2) / max(h1, h2)`, in `(0, 1]`.
    HeightRel,
    /// Smallest angle between the two boxes over 90 degrees, in `[0, 1]`.
    AngleDiff,
    /// Axis-aligned IoU of the unrotated footprints.
    Iou,
    /// IoU of the rotated rectangles.
    IouRotated,
    /// Euclidean distance of the supplied `bbox_center` points.
    CenterDistancesCorrected,
    /// L2 distance of the embeddings.
    DescriptorDist,
    /// Cosine similarity of the embeddings, in `[-1, 1]`.
    DescriptorCos,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 8] = [
        FeatureKind::WidthRel,
        FeatureKind::HeightRel,
        FeatureKind::AngleDiff,
        FeatureKind::Iou,
        FeatureKind::IouRotated,
        FeatureKind::CenterDistancesCorrected,
        FeatureKind::DescriptorDist,
        FeatureKind::DescriptorCos,
    ];

    /// Computed when no features are requested explicitly: every feature
    /// whose inputs the pair carries.
    pub const DEFAULT: [FeatureKind; 8] = FeatureKind::ALL;

    pub fn name(&self) -> &'static str {
        match self {
            FeatureKind::WidthRel => "width_rel",
            FeatureKind::HeightRel => "height_rel",
            FeatureKind::AngleDiff => "angle_diff",
            FeatureKind::Iou => "iou",
            FeatureKind::IouRotated => "iou_rotated",
            FeatureKind::CenterDistancesCorrected => "center_distances_corrected",
            FeatureKind::DescriptorDist => "descriptor_dist",
            FeatureKind::DescriptorCos => "descriptor_cos",
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeatureKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        FeatureKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| Error::UnknownFeature(s.to_string()))
    }
}

/// Which features to compute for a pair.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureSelection {
    /// `FeatureKind::DEFAULT`. Features whose inputs are missing on the pair
    /// (no angle, no centres, no embeddings) are left out instead of failing,
    /// and so is `descriptor_cos` of a zero-norm embedding unless the policy
    /// asks for `NaN`.
    All,
    /// Exactly these features; missing inputs are an error.
    Only(BTreeSet<FeatureKind>),
}

impl Default for FeatureSelection {
    fn default() -> Self {
        FeatureSelection::All
    }
}

impl FeatureSelection {
    /// An empty list selects `All`.
    pub fn from_kinds<I: IntoIterator<Item = FeatureKind>>(kinds: I) -> Self {
        let kinds: BTreeSet<_> = kinds.into_iter().collect();

        if kinds.is_empty() {
            FeatureSelection::All
        } else {
            FeatureSelection::Only(kinds)
        }
    }

    /// Parses canonical feature names, e.g. `["iou", "descriptor_cos"]`.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let kinds = names
            .into_iter()
            .map(|name| name.as_ref().parse())
            .collect::<Result<Vec<FeatureKind>>>()?;

        Ok(Self::from_kinds(kinds))
    }

    #[inline]
    pub fn is_all(&self) -> bool {
        matches!(self, FeatureSelection::All)
    }

    pub fn contains(&self, kind: FeatureKind) -> bool {
        match self {
            FeatureSelection::All => FeatureKind::DEFAULT.contains(&kind),
            FeatureSelection::Only(kinds) => kinds.contains(&kind),
        }
    }

    /// Selected kinds in canonical order.
    pub fn kinds(&self) -> Vec<FeatureKind> {
        FeatureKind::ALL
            .iter()
            .copied()
            .filter(|&kind| self.contains(kind))
            .collect()
    }
}

/// What to do when `descriptor_cos` meets a zero-norm embedding.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateVectorPolicy {
    /// Fail the pair with `Error::DegenerateVector`. Only for explicit
    /// selections; under `FeatureSelection::All` this acts as `Skip`.
    Fail,
    /// Store `NaN` for the feature.
    Nan,
    /// Leave the feature out of the set.
    Skip,
}

impl Default for DegenerateVectorPolicy {
    fn default() -> Self {
        DegenerateVectorPolicy::Fail
    }
}

/// Named features of one detection pair, in canonical `FeatureKind` order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet(BTreeMap<FeatureKind, f32>);

impl FeatureSet {
    #[inline]
    pub fn get(&self, kind: FeatureKind) -> Option<f32> {
        self.0.get(&kind).copied()
    }

    #[inline]
    pub fn contains(&self, kind: FeatureKind) -> bool {
        self.0.contains_key(&kind)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FeatureKind, f32)> + '_ {
        self.0.iter().map(|(&kind, &value)| (kind, value))
    }

    /// Feature vector in the order of `kinds`, for a downstream classifier.
    /// Fails if one of `kinds` was not computed.
    pub fn to_vector(&self, kinds: &[FeatureKind]) -> Result<Array1<f32>> {
        kinds
            .iter()
            .map(|&kind| {
                self.get(kind)
                    .ok_or_else(|| Error::Precondition(format!("feature {} was not computed", kind)))
            })
            .collect::<Result<Vec<f32>>>()
            .map(Array1::from)
    }
}

/// `min(a, b) / max(a, b)` of two positive lengths.
pub fn relative_size(a: f32, b: f32) -> Result<f32> {
    if !(a > 0.0 && b > 0.0) {
        return Err(Error::DegenerateBox(format!("non-positive side length ({}, {})", a, b)));
    }

    Ok(a.min(b) / a.max(b))
}

/// `min(|a1 - a2|, 180 - |a1 - a2|) / 90` for two angles in `[-90, 90]`.
///
/// Angles outside that range mean the boxes were not normalized; this is
/// reported, never clamped.
pub fn angle_diff(a1: f32, a2: f32) -> Result<f32> {
    for &angle in [a1, a2].iter() {
        if !(-90.0..=90.0).contains(&angle) {
            return Err(Error::Precondition(format!(
                "angle {} outside [-90, 90], normalize the box first", angle
            )));
        }
    }

    let diff = (a1 - a2).abs();

    Ok(diff.min(180.0 - diff) / 90.0)
}

#[inline]
pub fn center_distance(c1: [f32; 2], c2: [f32; 2]) -> f32 {
    (c2[0] - c1[0]).hypot(c2[1] - c1[1])
}

fn require<T>(value: Option<T>, kind: FeatureKind, what: &str) -> Result<T> {
    value.ok_or_else(|| Error::Precondition(format!("{} requires {} on both detections", kind, what)))
}

fn inputs_present(kind: FeatureKind, p1: &Detection, p2: &Detection) -> bool {
    match kind {
        FeatureKind::AngleDiff | FeatureKind::IouRotated => {
            p1.bbox.angle().is_some() && p2.bbox.angle().is_some()
        }
        FeatureKind::CenterDistancesCorrected => {
            p1.bbox_center.is_some() && p2.bbox_center.is_some()
        }
        FeatureKind::DescriptorDist | FeatureKind::DescriptorCos => {
            p1.embedding.is_some() && p2.embedding.is_some()
        }
        _ => true,
    }
}

/// Single feature of a pair whose boxes are already normalized. `None` means
/// the feature is left out of the set.
fn compute_one(kind: FeatureKind, p1: &Detection, p2: &Detection, policy: DegenerateVectorPolicy) -> Result<Option<f32>> {
    let value = match kind {
        FeatureKind::WidthRel => relative_size(p1.bbox.width(), p2.bbox.width())?,
        FeatureKind::HeightRel => relative_size(p1.bbox.height(), p2.bbox.height())?,
        FeatureKind::AngleDiff => {
            let a1 = require(p1.bbox.angle(), kind, "a rotated bbox")?;
            let a2 = require(p2.bbox.angle(), kind, "a rotated bbox")?;

            angle_diff(a1, a2)?
        }
        FeatureKind::Iou => iou(&p1.bbox.ltwh(), &p2.bbox.ltwh())?,
        FeatureKind::IouRotated => {
            let b1 = require(p1.bbox.as_rotated(), kind, "a rotated bbox")?;
            let b2 = require(p2.bbox.as_rotated(), kind, "a rotated bbox")?;

            iou_rotated(&b1, &b2)?
        }
        FeatureKind::CenterDistancesCorrected => {
            let c1 = require(p1.bbox_center, kind, "bbox_center")?;
            let c2 = require(p2.bbox_center, kind, "bbox_center")?;

            center_distance(c1, c2)
        }
        FeatureKind::DescriptorDist => {
            let e1 = require(p1.embedding.as_ref(), kind, "an embedding")?;
            let e2 = require(p2.embedding.as_ref(), kind, "an embedding")?;

            euclidean_distance(e1.view(), e2.view())?
        }
        FeatureKind::DescriptorCos => {
            let e1 = require(p1.embedding.as_ref(), kind, "an embedding")?;
            let e2 = require(p2.embedding.as_ref(), kind, "an embedding")?;

            match (cosine_similarity(e1.view(), e2.view()), policy) {
                (Err(Error::DegenerateVector), DegenerateVectorPolicy::Nan) => f32::NAN,
                (Err(Error::DegenerateVector), DegenerateVectorPolicy::Skip) => return Ok(None),
                (res, _) => res?,
            }
        }
    };

    Ok(Some(value))
}

/// Computes a set of similarity features between two detections.
///
/// Both boxes are normalized first, on copies; the detections themselves are
/// never modified. Zero-norm embeddings fail an explicitly requested
/// `descriptor_cos`, see `compute_features_with` for the other policies.
pub fn compute_features(p1: &Detection, p2: &Detection, selection: &FeatureSelection) -> Result<FeatureSet> {
    compute_features_with(p1, p2, selection, DegenerateVectorPolicy::Fail)
}

pub fn compute_features_with(
    p1: &Detection,
    p2: &Detection,
    selection: &FeatureSelection,
    policy: DegenerateVectorPolicy,
) -> Result<FeatureSet> {
    let p1 = Detection { bbox: p1.bbox.normalized(), ..p1.clone() };
    let p2 = Detection { bbox: p2.bbox.normalized(), ..p2.clone() };

    let policy = match policy {
        DegenerateVectorPolicy::Fail if selection.is_all() => DegenerateVectorPolicy::Skip,
        policy => policy,
    };

    let mut feats = BTreeMap::new();

    for kind in selection.kinds() {
        if selection.is_all() && !inputs_present(kind, &p1, &p2) {
            continue;
        }

        if let Some(value) = compute_one(kind, &p1, &p2, policy)? {
            feats.insert(kind, value);
        }
    }

    log::trace!("pair features: {:?}", feats);

    Ok(FeatureSet(feats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pair::DetectionBox;

    fn rotated(l: f32, t: f32, w: f32, h: f32, a: f32) -> Detection {
        Detection::new(DetectionBox::rotated(l, t, w, h, a))
    }

    fn only(kinds: &[FeatureKind]) -> FeatureSelection {
        FeatureSelection::from_kinds(kinds.iter().copied())
    }

    #[test]
    fn names_round_trip() {
        for kind in FeatureKind::ALL.iter() {
            assert_eq!(kind.name().parse::<FeatureKind>().unwrap(), *kind);
            assert_eq!(serde_json::to_string(kind).unwrap(), format!("\"{}\"", kind.name()));
        }

        assert!(matches!("area".parse::<FeatureKind>(), Err(Error::UnknownFeature(_))));
    }

    #[test]
    fn empty_selection_means_all() {
        assert_eq!(FeatureSelection::from_kinds(vec![]), FeatureSelection::All);
        assert_eq!(FeatureSelection::from_names(Vec::<String>::new()).unwrap(), FeatureSelection::All);
        assert!(FeatureSelection::All.contains(FeatureKind::AngleDiff));
        assert_eq!(FeatureSelection::All.kinds(), FeatureKind::DEFAULT.to_vec());
        assert_eq!(FeatureKind::DEFAULT, FeatureKind::ALL);
    }

    #[test]
    fn default_set_includes_angle_diff_for_rotated_boxes() {
        let p1 = rotated(0.0, 0.0, 10.0, 20.0, 30.0).with_center(5.0, 10.0).with_embedding(arr1(&[1.0, 0.0]));
        let p2 = rotated(0.0, 0.0, 10.0, 20.0, -15.0).with_center(5.0, 10.0).with_embedding(arr1(&[0.0, 1.0]));

        let feats = compute_features(&p1, &p2, &FeatureSelection::All).unwrap();
        let kinds: Vec<_> = feats.iter().map(|(k, _)| k).collect();

        assert_eq!(kinds, FeatureKind::ALL.to_vec());
        assert!((feats.get(FeatureKind::AngleDiff).unwrap() - 0.5).abs() < 1e-6);

        let upright = Detection::new(DetectionBox::upright(0.0, 0.0, 10.0, 20.0));
        let feats = compute_features(&p1, &upright, &FeatureSelection::All).unwrap();

        assert!(!feats.contains(FeatureKind::AngleDiff));
        assert!(!feats.contains(FeatureKind::IouRotated));
    }

    #[test]
    fn relative_sizes() {
        assert_eq!(relative_size(5.0, 5.0).unwrap(), 1.0);
        assert_eq!(relative_size(2.0, 8.0).unwrap(), 0.25);
        assert_eq!(relative_size(8.0, 2.0).unwrap(), 0.25);
        assert!(matches!(relative_size(0.0, 2.0), Err(Error::DegenerateBox(_))));
    }

    #[test]
    fn angle_differences() {
        assert_eq!(angle_diff(10.0, 10.0).unwrap(), 0.0);
        assert_eq!(angle_diff(-45.0, 45.0).unwrap(), 1.0);
        assert!((angle_diff(-80.0, 80.0).unwrap() - 20.0 / 90.0).abs() < 1e-6);
        assert_eq!(angle_diff(90.0, -90.0).unwrap(), 0.0);
        assert!(matches!(angle_diff(120.0, 0.0), Err(Error::Precondition(_))));
        assert!(matches!(angle_diff(0.0, f32::NAN), Err(Error::Precondition(_))));
    }

    #[test]
    fn selected_features_only() {
        let p1 = rotated(0.0, 0.0, 10.0, 10.0, 0.0);
        let p2 = rotated(5.0, 0.0, 10.0, 10.0, 0.0);

        let feats = compute_features(&p1, &p2, &only(&[FeatureKind::Iou, FeatureKind::AngleDiff])).unwrap();

        assert_eq!(feats.len(), 2);
        assert!((feats.get(FeatureKind::Iou).unwrap() - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(feats.get(FeatureKind::AngleDiff), Some(0.0));
        assert_eq!(feats.get(FeatureKind::WidthRel), None);
    }

    #[test]
    fn angle_diff_uses_normalized_angles() {
        // 170 degrees wraps to -10
        let p1 = rotated(0.0, 0.0, 10.0, 20.0, 170.0);
        let p2 = rotated(0.0, 0.0, 10.0, 20.0, 10.0);

        let feats = compute_features(&p1, &p2, &only(&[FeatureKind::AngleDiff])).unwrap();

        assert!((feats.get(FeatureKind::AngleDiff).unwrap() - 20.0 / 90.0).abs() < 1e-6);
    }

    #[test]
    fn width_and_height_compare_normalized_boxes() {
        // the wide box becomes 10 wide and 20 tall
        let p1 = rotated(0.0, 0.0, 20.0, 10.0, 0.0);
        let p2 = rotated(0.0, 0.0, 5.0, 40.0, 0.0);

        let feats = compute_features(&p1, &p2, &only(&[FeatureKind::WidthRel, FeatureKind::HeightRel])).unwrap();

        assert_eq!(feats.get(FeatureKind::WidthRel), Some(0.5));
        assert_eq!(feats.get(FeatureKind::HeightRel), Some(0.5));
    }

    #[test]
    fn default_set_skips_missing_inputs() {
        let p1 = Detection::new(DetectionBox::upright(0.0, 0.0, 10.0, 10.0));
        let p2 = Detection::new(DetectionBox::upright(5.0, 0.0, 10.0, 10.0));

        let feats = compute_features(&p1, &p2, &FeatureSelection::All).unwrap();
        let kinds: Vec<_> = feats.iter().map(|(k, _)| k).collect();

        assert_eq!(kinds, vec![FeatureKind::WidthRel, FeatureKind::HeightRel, FeatureKind::Iou]);
    }

    #[test]
    fn explicit_request_with_missing_inputs_fails() {
        let p1 = Detection::new(DetectionBox::upright(0.0, 0.0, 10.0, 10.0));
        let p2 = rotated(5.0, 0.0, 10.0, 10.0, 0.0);

        for kind in [
            FeatureKind::AngleDiff,
            FeatureKind::IouRotated,
            FeatureKind::CenterDistancesCorrected,
            FeatureKind::DescriptorDist,
            FeatureKind::DescriptorCos,
        ].iter() {
            let res = compute_features(&p1, &p2, &only(&[*kind]));
            assert!(matches!(res, Err(Error::Precondition(_))), "{}", kind);
        }
    }

    #[test]
    fn zero_norm_policies() {
        let p1 = rotated(0.0, 0.0, 1.0, 1.0, 0.0).with_embedding(arr1(&[0.0, 0.0]));
        let p2 = rotated(0.0, 0.0, 1.0, 1.0, 0.0).with_embedding(arr1(&[1.0, 0.0]));
        let sel = only(&[FeatureKind::DescriptorDist, FeatureKind::DescriptorCos]);

        assert!(matches!(compute_features(&p1, &p2, &sel), Err(Error::DegenerateVector)));

        let nan = compute_features_with(&p1, &p2, &sel, DegenerateVectorPolicy::Nan).unwrap();
        assert!(nan.get(FeatureKind::DescriptorCos).unwrap().is_nan());
        assert_eq!(nan.get(FeatureKind::DescriptorDist), Some(1.0));

        let skip = compute_features_with(&p1, &p2, &sel, DegenerateVectorPolicy::Skip).unwrap();
        assert!(!skip.contains(FeatureKind::DescriptorCos));
        assert_eq!(skip.len(), 1);
    }

    #[test]
    fn zero_norm_in_default_set_keeps_other_features() {
        let p1 = rotated(0.0, 0.0, 10.0, 10.0, 0.0).with_center(5.0, 5.0).with_embedding(arr1(&[0.0, 0.0]));
        let p2 = rotated(5.0, 0.0, 10.0, 10.0, 0.0).with_center(10.0, 5.0).with_embedding(arr1(&[1.0, 0.0]));

        let feats = compute_features(&p1, &p2, &FeatureSelection::All).unwrap();

        assert!(!feats.contains(FeatureKind::DescriptorCos));
        assert_eq!(feats.len(), FeatureKind::DEFAULT.len() - 1);
        assert_eq!(feats.get(FeatureKind::DescriptorDist), Some(1.0));
        assert_eq!(feats.get(FeatureKind::CenterDistancesCorrected), Some(5.0));
        assert!((feats.get(FeatureKind::Iou).unwrap() - 1.0 / 3.0).abs() < 1e-6);

        let nan = compute_features_with(&p1, &p2, &FeatureSelection::All, DegenerateVectorPolicy::Nan).unwrap();
        assert!(nan.get(FeatureKind::DescriptorCos).unwrap().is_nan());
    }

    #[test]
    fn inputs_are_untouched() {
        let p1 = rotated(0.0, 0.0, 20.0, 10.0, 135.0);
        let p2 = rotated(1.0, 1.0, 20.0, 10.0, 0.0);
        let (c1, c2) = (p1.clone(), p2.clone());

        compute_features(&p1, &p2, &FeatureSelection::All).unwrap();

        assert_eq!(p1, c1);
        assert_eq!(p2, c2);
    }

    #[test]
    fn feature_vector_order() {
        let p1 = rotated(0.0, 0.0, 10.0, 10.0, 0.0).with_center(0.0, 0.0);
        let p2 = rotated(0.0, 0.0, 10.0, 20.0, 0.0).with_center(3.0, 4.0);

        let feats = compute_features(&p1, &p2, &FeatureSelection::All).unwrap();
        let v = feats.to_vector(&[FeatureKind::CenterDistancesCorrected, FeatureKind::HeightRel]).unwrap();

        assert_eq!(v, arr1(&[5.0, 0.5]));
        assert!(feats.to_vector(&[FeatureKind::DescriptorCos]).is_err());
    }

    #[test]
    fn feature_set_serializes_by_name() {
        let p1 = rotated(0.0, 0.0, 10.0, 10.0, 0.0);
        let p2 = rotated(0.0, 0.0, 10.0, 10.0, 0.0);

        let feats = compute_features(&p1, &p2, &only(&[FeatureKind::Iou, FeatureKind::WidthRel])).unwrap();
        let json = serde_json::to_string(&feats).unwrap();

        assert_eq!(json, r#"{"width_rel":1.0,"iou":1.0}"#);
    }
}
