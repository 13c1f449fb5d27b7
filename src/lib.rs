pub mod error;
pub mod pair;
pub mod stream;

pub use error::{Error, Result};
pub use pair::{
    DegenerateVectorPolicy, Detection, DetectionBox, FeatureKind, FeatureSelection, FeatureSet, RotatedBBox,
};
pub use stream::{DetectionStream, FrameDetections};

use ndarray::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use pair::descriptor::{pairwise_cosine_similarity, pairwise_euclidean};
use pair::features::compute_features_with;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairFeatureConfig {
    /// Features to compute; empty means `FeatureKind::DEFAULT`.
    pub features: Vec<FeatureKind>,
    pub degenerate_vector: DegenerateVectorPolicy,
}

impl Default for PairFeatureConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PairFeatureConfig {
    pub fn new() -> Self {
        Self {
            features: vec![],
            degenerate_vector: DegenerateVectorPolicy::Fail,
        }
    }

    pub fn with_features(mut self, features: &[FeatureKind]) -> Self {
        self.features = features.to_vec();
        self
    }

    pub fn with_degenerate_vector(mut self, policy: DegenerateVectorPolicy) -> Self {
        self.degenerate_vector = policy;
        self
    }

    /// Parses e.g. `{"features": ["iou", "descriptor_cos"], "degenerate_vector": "nan"}`.
    /// Missing keys keep their defaults.
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(Error::Config)
    }

    #[inline]
    pub fn selection(&self) -> FeatureSelection {
        FeatureSelection::from_kinds(self.features.iter().copied())
    }
}

/// Pairwise feature extraction over single pairs or whole detection sets.
///
/// Holds no state besides its configuration; every call works on copies of
/// the given detections.
#[derive(Debug, Clone)]
pub struct PairFeatureExtractor {
    selection: FeatureSelection,
    policy: DegenerateVectorPolicy,
}

impl Default for PairFeatureExtractor {
    fn default() -> Self {
        Self::new(PairFeatureConfig::new())
    }
}

impl PairFeatureExtractor {
    pub fn new(config: PairFeatureConfig) -> Self {
        Self {
            selection: config.selection(),
            policy: config.degenerate_vector,
        }
    }

    #[inline]
    pub fn selection(&self) -> &FeatureSelection {
        &self.selection
    }

    #[inline]
    pub fn features(&self, p1: &Detection, p2: &Detection) -> Result<FeatureSet> {
        compute_features_with(p1, p2, &self.selection, self.policy)
    }

    /// Features of every `(lhs[i], rhs[j])` pair, row `i`, column `j`.
    ///
    /// Rows are computed in parallel. A failing pair does not stop the batch:
    /// it is logged and kept as an error entry for the caller to skip or
    /// substitute.
    pub fn cross_features(&self, lhs: &[Detection], rhs: &[Detection]) -> Vec<Vec<Result<FeatureSet>>> {
        log::debug!("computing features for {}x{} detection pairs", lhs.len(), rhs.len());

        lhs.par_iter()
            .enumerate()
            .map(|(i, p1)| {
                rhs.iter()
                    .enumerate()
                    .map(|(j, p2)| {
                        let res = self.features(p1, p2);

                        if let Err(ref err) = res {
                            log::warn!("pair ({}, {}) skipped: {}", i, j, err);
                        }

                        res
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// `cross_features` between two consecutive frames.
    #[inline]
    pub fn frame_features(&self, prev: &FrameDetections, next: &FrameDetections) -> Vec<Vec<Result<FeatureSet>>> {
        self.cross_features(&prev.detections, &next.detections)
    }

    /// Matrix of one feature over all pairs, shape `(lhs.len(), rhs.len())`.
    ///
    /// Unlike `cross_features` the first failing pair fails the whole matrix.
    /// Features left out by the `Skip` policy are stored as `NaN`.
    pub fn feature_matrix(&self, kind: FeatureKind, lhs: &[Detection], rhs: &[Detection]) -> Result<Array2<f32>> {
        match kind {
            FeatureKind::DescriptorDist | FeatureKind::DescriptorCos => self.descriptor_matrix(kind, lhs, rhs),
            _ => {
                let selection = FeatureSelection::from_kinds(Some(kind));

                let rows = lhs
                    .par_iter()
                    .map(|p1| {
                        rhs.iter()
                            .map(|p2| {
                                compute_features_with(p1, p2, &selection, self.policy)
                                    .map(|feats| feats.get(kind).unwrap_or(f32::NAN))
                            })
                            .collect::<Result<Vec<f32>>>()
                    })
                    .collect::<Result<Vec<Vec<f32>>>>()?;

                from_rows(rows, lhs.len(), rhs.len())
            }
        }
    }

    fn descriptor_matrix(&self, kind: FeatureKind, lhs: &[Detection], rhs: &[Detection]) -> Result<Array2<f32>> {
        let a = stack_embeddings(lhs, kind)?;
        let b = stack_embeddings(rhs, kind)?;

        if lhs.is_empty() || rhs.is_empty() {
            return Ok(Array2::zeros((lhs.len(), rhs.len())));
        }

        if kind == FeatureKind::DescriptorDist {
            return pairwise_euclidean(a.view(), b.view());
        }

        let sim = pairwise_cosine_similarity(a.view(), b.view())?;

        if self.policy == DegenerateVectorPolicy::Fail && sim.iter().any(|x| x.is_nan()) {
            return Err(Error::DegenerateVector);
        }

        Ok(sim)
    }
}

fn stack_embeddings(dets: &[Detection], kind: FeatureKind) -> Result<Array2<f32>> {
    let mut dim = None;
    let mut data = vec![];

    for det in dets {
        let emb = det.embedding.as_ref().ok_or_else(|| {
            Error::Precondition(format!("{} requires an embedding on every detection", kind))
        })?;

        match dim {
            None => dim = Some(emb.len()),
            Some(d) if d != emb.len() => return Err(Error::DimensionMismatch(d, emb.len())),
            _ => {}
        }

        data.extend(emb.iter().copied());
    }

    let dim = dim.unwrap_or(0);

    Array2::from_shape_vec((dets.len(), dim), data).map_err(|err| Error::Internal(err.to_string()))
}

fn from_rows(rows: Vec<Vec<f32>>, nrows: usize, ncols: usize) -> Result<Array2<f32>> {
    let data = rows.into_iter().flatten().collect();

    Array2::from_shape_vec((nrows, ncols), data).map_err(|err| Error::Internal(err.to_string()))
}
