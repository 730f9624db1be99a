pub mod visualization;

use serde::Serialize;

use crate::{
    analysis::MaskMetrics,
    detection::DetectionResult,
    image_utils::count_on,
};

#[derive(Serialize)]
pub struct JsonReport {
    pub forged: bool,
    pub matching: MatchingReportSection,
    pub clustering: ClusteringReportSection,
    pub mask: MaskReportSection,
    pub metrics: Option<MaskMetrics>,
}

#[derive(Serialize)]
pub struct MatchingReportSection {
    pub keypoint_count: usize,
    pub match_count: usize,
    pub line_count: usize,
}

#[derive(Serialize)]
pub struct ClusteringReportSection {
    pub cluster_count: usize,
    pub cluster_sizes: Vec<usize>,
    pub outlier_count: usize,
    pub min_pts_used: usize,
    pub attempts: usize,
}

#[derive(Serialize)]
pub struct MaskReportSection {
    pub width: u32,
    pub height: u32,
    pub hull_count: usize,
    pub computed_pixels: usize,
    pub expanded_pixels: usize,
    pub expansion_passes: usize,
    pub expansion_steps: usize,
}

impl From<&DetectionResult> for JsonReport {
    fn from(result: &DetectionResult) -> Self {
        let (width, height) = result.expanded_mask.dimensions();

        Self {
            forged: result.is_forged(),
            matching: MatchingReportSection {
                keypoint_count: result.interest_points.len(),
                match_count: result.matches.pair_count(),
                line_count: result.lines.len(),
            },
            clustering: ClusteringReportSection {
                cluster_count: result.clustering.clusters.len(),
                cluster_sizes: result.clustering.clusters.iter().map(|c| c.len()).collect(),
                outlier_count: result.clustering.outliers.len(),
                min_pts_used: result.clustering.min_pts_used,
                attempts: result.clustering.attempts,
            },
            mask: MaskReportSection {
                width,
                height,
                hull_count: result.hulls.len(),
                computed_pixels: count_on(&result.computed_mask),
                expanded_pixels: count_on(&result.expanded_mask),
                expansion_passes: result.growth_passes.iter().sum(),
                expansion_steps: result.steps.len(),
            },
            metrics: result.metrics,
        }
    }
}

impl JsonReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, RgbImage};

    use super::*;
    use crate::{
        DetectorOptions,
        detection::{CopyMoveDetector, Detector},
    };

    #[test]
    fn test_report_of_empty_detection() {
        let detector = CopyMoveDetector::new(DetectorOptions::default()).unwrap();
        let result = detector
            .detect(&DynamicImage::ImageRgb8(RgbImage::new(32, 20)))
            .unwrap();

        let report = JsonReport::from(&result);
        assert!(!report.forged);
        assert_eq!(report.mask.width, 32);
        assert_eq!(report.mask.expanded_pixels, 0);
        assert_eq!(report.mask.expansion_passes, 0);

        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["matching"]["keypoint_count"], 0);
        assert!(value["metrics"].is_null());
    }
}
