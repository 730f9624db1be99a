use image::RgbImage;
use imageproc::corners::corners_fast9;
use log::debug;
use ndarray::Array2;

use crate::{
    error::{ForensicsError, Result},
    image_utils::{gray_to_array, rgb_to_gray},
};

use super::{Feature, FeatureExtractor, KeyPoint};

/// FAST-9 corners oriented by their intensity centroid, described by a
/// rotated grid of patch samples normalised to unit length.
pub struct FastPatchExtractor {
    threshold: u8,
    patch_radius: u32,
    grid: usize,
    max_features: usize,
}

impl FastPatchExtractor {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold,
            patch_radius: 8,
            grid: 8,
            max_features: 5000,
        }
    }

    pub fn with_patch_radius(mut self, radius: u32) -> Result<Self> {
        if radius < 2 {
            return Err(ForensicsError::InvalidParameter(
                "Patch radius must be at least 2".into()
            ));
        }
        self.patch_radius = radius;
        Ok(self)
    }

    pub fn with_grid(mut self, grid: usize) -> Result<Self> {
        if grid < 2 {
            return Err(ForensicsError::InvalidParameter(
                "Descriptor grid must be at least 2x2".into()
            ));
        }
        self.grid = grid;
        Ok(self)
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn descriptor_len(&self) -> usize {
        self.grid * self.grid
    }

    /// Orientation in degrees within `[0, 360)`.
    fn orientation(&self, plane: &Array2<f64>, cx: u32, cy: u32) -> f32 {
        let r = self.patch_radius as i64;
        let (height, width) = plane.dim();
        let mut m10 = 0.0;
        let mut m01 = 0.0;

        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy > r * r {
                    continue;
                }
                let x = cx as i64 + dx;
                let y = cy as i64 + dy;
                if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                    continue;
                }
                let v = plane[[y as usize, x as usize]];
                m10 += dx as f64 * v;
                m01 += dy as f64 * v;
            }
        }

        let angle = m01.atan2(m10).to_degrees().rem_euclid(360.0) as f32;
        if angle >= 360.0 { 0.0 } else { angle }
    }

    fn describe(&self, plane: &Array2<f64>, cx: u32, cy: u32, angle: f32) -> Option<Vec<f32>> {
        let (sin, cos) = (angle as f64).to_radians().sin_cos();
        let r = self.patch_radius as f64;
        let step = 2.0 * r / (self.grid - 1) as f64;

        let mut samples = Vec::with_capacity(self.descriptor_len());
        for gy in 0..self.grid {
            for gx in 0..self.grid {
                let u = -r + gx as f64 * step;
                let v = -r + gy as f64 * step;
                let x = cx as f64 + u * cos - v * sin;
                let y = cy as f64 + u * sin + v * cos;
                samples.push(bilinear(plane, x, y));
            }
        }

        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        samples.iter_mut().for_each(|s| *s -= mean);

        let norm = samples.iter().map(|s| s * s).sum::<f64>().sqrt();
        if norm < 1e-9 {
            return None;
        }

        Some(samples.iter().map(|s| (s / norm) as f32).collect())
    }
}

impl Default for FastPatchExtractor {
    fn default() -> Self {
        Self::new(20)
    }
}

impl FeatureExtractor for FastPatchExtractor {
    fn extract(&self, image: &RgbImage) -> Result<Vec<Feature>> {
        let gray = rgb_to_gray(image);
        let plane = gray_to_array(&gray);

        let mut corners = corners_fast9(&gray, self.threshold);
        corners.sort_by(|a, b| b.score.total_cmp(&a.score));
        corners.truncate(self.max_features);

        let features = corners
            .iter()
            .filter_map(|corner| {
                let angle = self.orientation(&plane, corner.x, corner.y);
                let descriptor = self.describe(&plane, corner.x, corner.y, angle)?;
                let keypoint = KeyPoint {
                    x: corner.x as f32,
                    y: corner.y as f32,
                    size: (2 * self.patch_radius + 1) as f32,
                    angle,
                    response: corner.score,
                };
                Some(Feature::new(keypoint, descriptor))
            })
            .collect::<Vec<_>>();

        debug!("{} extracted {} features", self.name(), features.len());

        Ok(features)
    }

    fn name(&self) -> &str {
        "FAST-9 patch extractor"
    }
}

fn bilinear(plane: &Array2<f64>, x: f64, y: f64) -> f64 {
    let (height, width) = plane.dim();
    let x = x.clamp(0.0, (width - 1) as f64);
    let y = y.clamp(0.0, (height - 1) as f64);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let top = plane[[y0, x0]] * (1.0 - fx) + plane[[y0, x1]] * fx;
    let bottom = plane[[y1, x0]] * (1.0 - fx) + plane[[y1, x1]] * fx;
    top * (1.0 - fy) + bottom * fy
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    // bright 10x10 squares on a dark background, one every 20 pixels
    fn squares(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            if (5..15).contains(&(x % 20)) && (5..15).contains(&(y % 20)) {
                Rgb([230, 230, 230])
            } else {
                Rgb([20, 20, 20])
            }
        })
    }

    #[test]
    fn test_flat_image_has_no_features() {
        let image = RgbImage::from_pixel(32, 32, Rgb([90, 90, 90]));
        let features = FastPatchExtractor::default().extract(&image).unwrap();
        assert!(features.is_empty());
    }

    #[test]
    fn test_descriptors_are_unit_length() {
        let extractor = FastPatchExtractor::default();
        let features = extractor.extract(&squares(64, 64)).unwrap();
        assert!(!features.is_empty());

        for feature in &features {
            assert_eq!(feature.descriptor.len(), extractor.descriptor_len());
            let norm = feature.descriptor.iter().map(|&v| (v as f64).powi(2)).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-4);
            assert!((0.0..360.0).contains(&feature.keypoint.angle));
        }
    }

    #[test]
    fn test_max_features_truncates() {
        let extractor = FastPatchExtractor::default().with_max_features(3);
        let features = extractor.extract(&squares(64, 64)).unwrap();
        assert!(features.len() <= 3);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(FastPatchExtractor::default().with_patch_radius(1).is_err());
        assert!(FastPatchExtractor::default().with_grid(1).is_err());
    }

    #[test]
    fn test_bilinear_interpolates() {
        let mut plane = Array2::zeros((2, 2));
        plane[[0, 1]] = 10.0;
        plane[[1, 1]] = 10.0;
        assert!((bilinear(&plane, 0.5, 0.5) - 5.0).abs() < 1e-12);
        assert_eq!(bilinear(&plane, 5.0, 5.0), 10.0);
    }
}
