use std::path::Path;

use image::{DynamicImage, GrayImage, RgbImage};
use log::{debug, warn};

use crate::{
    DetectorOptions,
    analysis::{
        Clustering, HullPair, MaskGrowth, MaskMetrics, Matcher, Matches,
        dbscan::{cluster_lines, is_degenerate},
        mask::{build_hulls, fill_hulls, grow_mask},
        matching::build_lines,
    },
    error::{ForensicsError, Result},
    features::{FastPatchExtractor, FeatureExtractor, InterestPoints},
    geometry::Line,
};

/// Everything the pipeline produced for one image, stage by stage.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub interest_points: InterestPoints,
    pub matches: Matches,
    pub lines: Vec<Line>,
    pub clustering: Clustering,
    pub hulls: Vec<HullPair>,
    /// Filled hulls, before growth.
    pub computed_mask: GrayImage,
    pub expanded_mask: GrayImage,
    /// Expanded mask after every growth pass that changed it, when requested.
    pub steps: Vec<GrayImage>,
    /// Growth passes run for each hull pair.
    pub growth_passes: Vec<usize>,
    pub metrics: Option<MaskMetrics>,
}

impl DetectionResult {
    pub fn is_forged(&self) -> bool {
        !self.clustering.clusters.is_empty()
    }

    pub fn save_mask<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.expanded_mask.save(path)?;
        Ok(())
    }

    pub fn save_computed_mask<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.computed_mask.save(path)?;
        Ok(())
    }
}

pub trait Detector {
    fn detect(&self, image: &DynamicImage) -> Result<DetectionResult>;

    fn name(&self) -> &str;

    fn description(&self) -> &str;
}

/// Keypoint based copy-move detector.
///
/// Runs as a chain of stages, each one taking the output of the previous:
/// interest points, g2NN matching, lines, DBSCAN clustering, hulls, filled
/// mask and mask growth. Every stage is public so that it can be run alone.
pub struct CopyMoveDetector {
    options: DetectorOptions,
    extractor: Box<dyn FeatureExtractor + Send + Sync>,
}

impl CopyMoveDetector {
    pub fn new(options: DetectorOptions) -> Result<Self> {
        options.validate()?;
        let extractor = FastPatchExtractor::new(options.detector_threshold);

        Ok(Self {
            options,
            extractor: Box::new(extractor),
        })
    }

    pub fn with_extractor(mut self, extractor: Box<dyn FeatureExtractor + Send + Sync>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn options(&self) -> &DetectorOptions {
        &self.options
    }

    pub fn find_interest_points(&self, image: &RgbImage) -> Result<InterestPoints> {
        let features = self.extractor.extract(image)?;
        debug!("{} found {} keypoints", self.extractor.name(), features.len());

        if let Some(first) = features.first() {
            let len = first.descriptor.len();
            if let Some(other) = features.iter().find(|f| f.descriptor.len() != len) {
                return Err(ForensicsError::InvalidParameter(format!(
                    "{} returned descriptors of lengths {} and {}",
                    self.extractor.name(),
                    len,
                    other.descriptor.len()
                )));
            }
        }

        Ok(InterestPoints::new(
            features,
            self.options.angle_threshold,
            self.options.norm_threshold,
        ))
    }

    pub fn match_points(&self, points: &InterestPoints) -> Result<Matches> {
        Matcher::new(points, self.options.match_strategy).run(self.options.jobs)
    }

    pub fn build_lines(&self, points: &InterestPoints, matches: &Matches) -> Vec<Line> {
        build_lines(points, matches, self.options.min_line_length)
    }

    /// Clusters the lines that can serve as DBSCAN cores; the others are
    /// dropped beforehand.
    pub fn cluster(&self, lines: &[Line], width: u32, height: u32) -> Result<Clustering> {
        let (usable, degenerate): (Vec<Line>, Vec<Line>) =
            lines.iter().cloned().partition(|l| !is_degenerate(l));

        for line in &degenerate {
            warn!(
                "Dropping line {} before clustering (theta = {}, length = {})",
                line.to_cartesian_string(),
                line.theta(),
                line.length()
            );
        }

        cluster_lines(&usable, &self.options.dbscan_params(), height, width)
    }

    pub fn build_hulls(&self, clustering: &Clustering) -> Vec<HullPair> {
        build_hulls(&clustering.clusters)
    }

    pub fn compute_mask(&self, width: u32, height: u32, hulls: &[HullPair]) -> GrayImage {
        fill_hulls(width, height, hulls)
    }

    pub fn grow_mask(&self, image: &RgbImage, initial: &GrayImage, hulls: &[HullPair]) -> Result<MaskGrowth> {
        grow_mask(image, initial, hulls, &self.options.growth_params())
    }
}

impl Detector for CopyMoveDetector {
    fn detect(&self, image: &DynamicImage) -> Result<DetectionResult> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        let interest_points = self.find_interest_points(&rgb)?;
        let matches = self.match_points(&interest_points)?;
        let lines = self.build_lines(&interest_points, &matches);
        let clustering = self.cluster(&lines, width, height)?;
        let hulls = self.build_hulls(&clustering);
        let computed_mask = self.compute_mask(width, height, &hulls);
        let growth = self.grow_mask(&rgb, &computed_mask, &hulls)?;

        debug!(
            "{} keypoints, {} matches, {} lines, {} clusters (minPts = {})",
            interest_points.len(),
            matches.pair_count(),
            lines.len(),
            clustering.clusters.len(),
            clustering.min_pts_used
        );

        Ok(DetectionResult {
            interest_points,
            matches,
            lines,
            clustering,
            hulls,
            computed_mask,
            expanded_mask: growth.mask,
            steps: growth.steps,
            growth_passes: growth.iterations,
            metrics: None,
        })
    }

    fn name(&self) -> &str {
        "Copy-Move Detector"
    }

    fn description(&self) -> &str {
        "Matches keypoints with a g2NN test, clusters the matches with DBSCAN and grows the hulls of the clusters by local PSNR"
    }
}
