use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage};
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    analysis::{DbscanParams, GrowthParams, MatchStrategy, metrics::compare_masks},
    detection::{CopyMoveDetector, DetectionResult, Detector},
    error::{ForensicsError, Result},
    image_utils::binarize_mask,
};

pub mod analysis;
pub mod detection;
pub mod error;
pub mod features;
pub mod geometry;
pub mod image_utils;
pub mod report;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorOptions {
    pub image: PathBuf,
    pub mask: Option<PathBuf>,
    pub detector_threshold: u8,
    pub angle_threshold: f64,
    pub norm_threshold: f64,
    pub match_strategy: MatchStrategy,
    pub min_line_length: f64,
    pub dbscan_min_pts: usize,
    pub dbscan_epsilon: f64,
    pub dbscan_wx: f64,
    pub dbscan_wy: f64,
    pub dbscan_wtheta: f64,
    pub psnr_threshold: f64,
    pub expansion_window: u32,
    pub max_expansion_iterations: usize,
    pub draw_keypoints: bool,
    pub draw_matches: bool,
    pub draw_clusters: bool,
    pub draw_hulls: bool,
    pub step_by_step_expansion: bool,
    pub save_computed_mask: bool,
    pub jobs: usize,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            image: PathBuf::new(),
            mask: None,
            detector_threshold: 20,
            angle_threshold: 4.0,
            norm_threshold: 1.2,
            match_strategy: MatchStrategy::AngleWindow,
            min_line_length: 50.0,
            dbscan_min_pts: 10,
            dbscan_epsilon: 0.5,
            dbscan_wx: 0.25,
            dbscan_wy: 0.25,
            dbscan_wtheta: 0.25,
            psnr_threshold: 150.0,
            expansion_window: 13,
            max_expansion_iterations: 20,
            draw_keypoints: false,
            draw_matches: false,
            draw_clusters: false,
            draw_hulls: false,
            step_by_step_expansion: false,
            save_computed_mask: false,
            jobs: 1,
        }
    }
}

fn check_non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ForensicsError::InvalidParameter(format!(
            "{} must be finite and non-negative, got {}",
            name, value
        )))
    }
}

impl DetectorOptions {
    pub fn new<P: AsRef<Path>>(image: P) -> Self {
        Self {
            image: image.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Options for a command-line input: a `.json` file is read as a full
    /// options record, kept as written; anything else is an image path run
    /// with every view drawn and one job per available core.
    pub fn from_input<P: AsRef<Path>>(input: P) -> Result<Self> {
        let input = input.as_ref();
        if input.extension().is_some_and(|ext| ext == "json") {
            return Self::from_json_file(input);
        }

        let jobs = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Ok(Self::new(input).with_all_drawings().with_jobs(jobs))
    }

    pub fn validate(&self) -> Result<()> {
        if self.jobs == 0 {
            return Err(ForensicsError::InvalidParameter(
                "Number of jobs must be at least 1".into()
            ));
        }
        if self.expansion_window % 2 == 0 {
            return Err(ForensicsError::InvalidParameter(format!(
                "Expansion window must be odd, got {}",
                self.expansion_window
            )));
        }
        if self.max_expansion_iterations == 0 {
            return Err(ForensicsError::InvalidParameter(
                "At least one expansion iteration is required".into()
            ));
        }

        check_non_negative("angle_threshold", self.angle_threshold)?;
        check_non_negative("norm_threshold", self.norm_threshold)?;
        check_non_negative("min_line_length", self.min_line_length)?;
        check_non_negative("dbscan_epsilon", self.dbscan_epsilon)?;
        check_non_negative("dbscan_wx", self.dbscan_wx)?;
        check_non_negative("dbscan_wy", self.dbscan_wy)?;
        check_non_negative("dbscan_wtheta", self.dbscan_wtheta)?;
        if !self.psnr_threshold.is_finite() {
            return Err(ForensicsError::InvalidParameter(
                "PSNR threshold must be finite".into()
            ));
        }

        let weights = self.dbscan_wx + self.dbscan_wy + self.dbscan_wtheta;
        if weights > 1.0 {
            return Err(ForensicsError::InvalidParameter(format!(
                "DBSCAN weights sum to {}, leaving a negative length weight",
                weights
            )));
        }

        Ok(())
    }

    pub fn dbscan_params(&self) -> DbscanParams {
        DbscanParams {
            min_pts: self.dbscan_min_pts,
            epsilon: self.dbscan_epsilon,
            wx: self.dbscan_wx,
            wy: self.dbscan_wy,
            wtheta: self.dbscan_wtheta,
        }
    }

    pub fn growth_params(&self) -> GrowthParams {
        GrowthParams {
            psnr_threshold: self.psnr_threshold,
            ksize: self.expansion_window,
            max_iterations: self.max_expansion_iterations,
            keep_steps: self.step_by_step_expansion,
        }
    }

    pub fn with_mask<P: AsRef<Path>>(mut self, mask: P) -> Self {
        self.mask = Some(mask.as_ref().to_path_buf());
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_match_strategy(mut self, strategy: MatchStrategy) -> Self {
        self.match_strategy = strategy;
        self
    }

    pub fn with_min_line_length(mut self, length: f64) -> Self {
        self.min_line_length = length;
        self
    }

    pub fn with_dbscan(mut self, min_pts: usize, epsilon: f64) -> Self {
        self.dbscan_min_pts = min_pts;
        self.dbscan_epsilon = epsilon;
        self
    }

    pub fn with_psnr_threshold(mut self, threshold: f64) -> Self {
        self.psnr_threshold = threshold;
        self
    }

    pub fn with_computed_mask(mut self) -> Self {
        self.save_computed_mask = true;
        self
    }

    pub fn with_all_drawings(mut self) -> Self {
        self.draw_keypoints = true;
        self.draw_matches = true;
        self.draw_clusters = true;
        self.draw_hulls = true;
        self
    }
}

/// Runs the copy-move detector on an image, optionally scoring the
/// expanded mask against a ground truth.
pub struct CopyMoveAnalyzer {
    original: DynamicImage,
    ground_truth: Option<GrayImage>,
    options: DetectorOptions,
    path: Option<String>,
}

impl CopyMoveAnalyzer {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_options(DetectorOptions::new(path))
    }

    pub fn from_options(options: DetectorOptions) -> Result<Self> {
        options.validate()?;

        let path_str = options.image.to_string_lossy().to_string();
        let original = image::open(&options.image)?;

        let analyzer = Self {
            original,
            ground_truth: None,
            options: options.clone(),
            path: Some(path_str),
        };

        match &options.mask {
            Some(mask) => analyzer.load_ground_truth(mask),
            None => Ok(analyzer),
        }
    }

    pub fn from_image(image: DynamicImage) -> Self {
        Self {
            original: image,
            ground_truth: None,
            options: DetectorOptions::default(),
            path: None,
        }
    }

    pub fn with_config(mut self, options: DetectorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_ground_truth(mut self, mask: GrayImage) -> Result<Self> {
        let expected = (self.original.width(), self.original.height());
        if mask.dimensions() != expected {
            return Err(ForensicsError::DimensionMismatch {
                expected,
                found: mask.dimensions(),
            });
        }

        self.ground_truth = Some(mask);
        Ok(self)
    }

    pub fn load_ground_truth<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        let mask = binarize_mask(&image::open(path)?.to_luma8());
        self.with_ground_truth(mask)
    }

    pub fn image(&self) -> &DynamicImage {
        &self.original
    }

    pub fn ground_truth(&self) -> Option<&GrayImage> {
        self.ground_truth.as_ref()
    }

    pub fn options(&self) -> &DetectorOptions {
        &self.options
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn analyze(&self) -> Result<DetectionResult> {
        let detector = CopyMoveDetector::new(self.options.clone())?;
        let mut result = detector.detect(&self.original)?;

        if let Some(truth) = &self.ground_truth {
            let metrics = compare_masks(truth, &result.expanded_mask)?;
            info!("Dice = {}", metrics.dice);
            info!("Jaccard = {}", metrics.jaccard);
            info!(
                "Precision = {}, Recall = {}, F1 = {}",
                metrics.precision, metrics.recall, metrics.f1
            );
            result.metrics = Some(metrics);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use image::{Luma, RgbImage};

    use super::*;

    #[test]
    fn test_default_options_are_valid() {
        assert!(DetectorOptions::default().validate().is_ok());
    }

    #[test]
    fn test_options_from_partial_json() {
        let options = DetectorOptions::from_json_str(
            r#"{ "image": "forged.png", "jobs": 4, "match_strategy": "NormWindow", "psnr_threshold": 120.0 }"#,
        )
        .unwrap();

        assert_eq!(options.image, PathBuf::from("forged.png"));
        assert_eq!(options.jobs, 4);
        assert_eq!(options.match_strategy, MatchStrategy::NormWindow);
        assert_eq!(options.psnr_threshold, 120.0);
        assert_eq!(options.dbscan_min_pts, 10);
        assert_eq!(options.expansion_window, 13);
    }

    #[test]
    fn test_save_computed_mask_from_json() {
        assert!(!DetectorOptions::default().save_computed_mask);

        let options = DetectorOptions::from_json_str(r#"{ "save_computed_mask": true }"#).unwrap();
        assert!(options.save_computed_mask);

        let json = serde_json::to_string(&options).unwrap();
        let reloaded = DetectorOptions::from_json_str(&json).unwrap();
        assert_eq!(reloaded, options);
        assert_eq!(reloaded, DetectorOptions::default().with_computed_mask());
    }

    #[test]
    fn test_input_kind_selects_options() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{ "image": "forged.png", "jobs": 3 }"#).unwrap();

        let options = DetectorOptions::from_input(&path).unwrap();
        assert_eq!(options.jobs, 3);
        assert!(!options.draw_matches);

        let options = DetectorOptions::from_input("forged.png").unwrap();
        assert_eq!(options.image, PathBuf::from("forged.png"));
        assert!(options.jobs >= 1);
        assert!(options.draw_keypoints && options.draw_matches && options.draw_clusters && options.draw_hulls);
    }

    #[test]
    fn test_invalid_options() {
        assert!(matches!(
            DetectorOptions::from_json_str(r#"{ "expansion_window": 12 }"#),
            Err(ForensicsError::InvalidParameter(_))
        ));
        assert!(matches!(
            DetectorOptions::from_json_str(r#"{ "jobs": "many" }"#),
            Err(ForensicsError::Config(_))
        ));

        let heavy = DetectorOptions {
            dbscan_wx: 0.5,
            dbscan_wy: 0.5,
            dbscan_wtheta: 0.5,
            ..DetectorOptions::default()
        };
        assert!(heavy.validate().is_err());

        let negative = DetectorOptions::default().with_min_line_length(-1.0);
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_missing_image_is_fatal() {
        assert!(CopyMoveAnalyzer::new("/nonexistent/forged.png").is_err());
    }

    #[test]
    fn test_ground_truth_dimensions_checked() {
        let analyzer = CopyMoveAnalyzer::from_image(DynamicImage::ImageRgb8(RgbImage::new(16, 16)));
        assert!(matches!(
            analyzer.with_ground_truth(GrayImage::new(8, 16)),
            Err(ForensicsError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_analyze_attaches_metrics() {
        let analyzer = CopyMoveAnalyzer::from_image(DynamicImage::ImageRgb8(RgbImage::new(24, 24)))
            .with_ground_truth(GrayImage::from_pixel(24, 24, Luma([0])))
            .unwrap();

        let result = analyzer.analyze().unwrap();
        let metrics = result.metrics.unwrap();
        assert_eq!(metrics.dice, 0.0);
        assert_eq!(metrics.true_positives, 0);
    }
}
