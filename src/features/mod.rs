pub mod extractor;
pub mod interest_points;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::{error::Result, geometry::Point2};

pub use extractor::FastPatchExtractor;
pub use interest_points::{InterestPoints, Neighbor};

/// Detector output for one interest point. `angle` is in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub angle: f32,
    pub response: f32,
}

impl KeyPoint {
    pub fn new(x: f32, y: f32, angle: f32) -> Self {
        Self {
            x,
            y,
            size: 1.0,
            angle,
            response: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub keypoint: KeyPoint,
    pub descriptor: Vec<f32>,
}

impl Feature {
    pub fn new(keypoint: KeyPoint, descriptor: Vec<f32>) -> Self {
        Self { keypoint, descriptor }
    }
}

pub trait FeatureExtractor {
    fn extract(&self, image: &RgbImage) -> Result<Vec<Feature>>;

    fn name(&self) -> &str;
}

/// A keypoint with its descriptor and its rank in both orderings of the
/// owning [`InterestPoints`]. Ranks are rewritten on every sort.
#[derive(Debug, Clone)]
pub struct InterestPoint {
    keypoint: KeyPoint,
    descriptor: Vec<f32>,
    norm: f64,
    angle_idx: usize,
    norm_idx: usize,
}

impl InterestPoint {
    pub fn new(feature: Feature) -> Self {
        let norm = l2_norm(&feature.descriptor);
        Self {
            keypoint: feature.keypoint,
            descriptor: feature.descriptor,
            norm,
            angle_idx: 0,
            norm_idx: 0,
        }
    }

    pub fn keypoint(&self) -> &KeyPoint {
        &self.keypoint
    }

    pub fn position(&self) -> Point2 {
        Point2::new(self.keypoint.x as f64, self.keypoint.y as f64)
    }

    pub fn angle(&self) -> f64 {
        self.keypoint.angle as f64
    }

    pub fn descriptor(&self) -> &[f32] {
        &self.descriptor
    }

    pub fn norm(&self) -> f64 {
        self.norm
    }

    pub fn angle_idx(&self) -> usize {
        self.angle_idx
    }

    pub fn norm_idx(&self) -> usize {
        self.norm_idx
    }

    pub(crate) fn set_angle_idx(&mut self, idx: usize) {
        self.angle_idx = idx;
    }

    pub(crate) fn set_norm_idx(&mut self, idx: usize) {
        self.norm_idx = idx;
    }

    pub fn descriptor_distance(&self, other: &InterestPoint) -> f64 {
        descriptor_distance(&self.descriptor, &other.descriptor)
    }

    pub fn descriptor_equals(&self, other: &InterestPoint) -> bool {
        self.descriptor_distance(other) == 0.0
    }

    pub fn angle_equals(&self, other: &InterestPoint) -> bool {
        self.keypoint.angle == other.keypoint.angle
    }
}

/// Identity for matching purposes: same descriptor and same orientation.
impl PartialEq for InterestPoint {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor_equals(other) && self.angle_equals(other)
    }
}

pub fn l2_norm(v: &[f32]) -> f64 {
    v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt()
}

pub fn descriptor_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}
