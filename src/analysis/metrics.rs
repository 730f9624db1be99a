use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ForensicsError, Result},
    image_utils::is_on,
};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MaskMetrics {
    pub dice: f64,
    pub jaccard: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 { 0.0 } else { num / den }
}

pub fn compare_masks(ground_truth: &GrayImage, computed: &GrayImage) -> Result<MaskMetrics> {
    if ground_truth.dimensions() != computed.dimensions() {
        return Err(ForensicsError::DimensionMismatch {
            expected: ground_truth.dimensions(),
            found: computed.dimensions(),
        });
    }

    let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
    for (truth, found) in ground_truth.pixels().zip(computed.pixels()) {
        match (is_on(truth[0]), is_on(found[0])) {
            (true, true) => tp += 1,
            (true, false) => fn_ += 1,
            (false, true) => fp += 1,
            (false, false) => {}
        }
    }

    let (t, p, n) = (tp as f64, fp as f64, fn_ as f64);
    let precision = ratio(t, t + p);
    let recall = ratio(t, t + n);

    Ok(MaskMetrics {
        dice: ratio(2.0 * t, 2.0 * t + p + n),
        jaccard: ratio(t, t + p + n),
        precision,
        recall,
        f1: ratio(2.0 * precision * recall, precision + recall),
        true_positives: tp,
        false_positives: fp,
        false_negatives: fn_,
    })
}

#[cfg(test)]
mod tests {
    use image::Luma;

    use super::*;

    fn rect(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn test_identical_masks() {
        let mask = rect(20, 20, 2, 2, 10, 10);
        let m = compare_masks(&mask, &mask).unwrap();
        assert_eq!(m.dice, 1.0);
        assert_eq!(m.jaccard, 1.0);
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.f1, 1.0);
    }

    #[test]
    fn test_computed_inside_truth() {
        let truth = rect(20, 20, 0, 0, 10, 10);
        let computed = rect(20, 20, 0, 0, 5, 10);
        let m = compare_masks(&truth, &computed).unwrap();

        let (a, b) = (100.0, 50.0);
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 0.5);
        assert!((m.dice - 2.0 * b / (a + b)).abs() < 1e-12);
        assert!((m.jaccard - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_truth_inside_computed() {
        let truth = rect(20, 20, 0, 0, 5, 10);
        let computed = rect(20, 20, 0, 0, 10, 10);
        let m = compare_masks(&truth, &computed).unwrap();

        assert_eq!(m.recall, 1.0);
        assert_eq!(m.precision, 0.5);
        assert!((m.dice - 2.0 * 50.0 / 150.0).abs() < 1e-12);
        assert!((m.f1 - m.dice).abs() < 1e-12);
    }

    #[test]
    fn test_empty_masks_do_not_divide_by_zero() {
        let empty = GrayImage::new(8, 8);
        let m = compare_masks(&empty, &empty).unwrap();
        assert_eq!(m, MaskMetrics::default());
    }

    #[test]
    fn test_threshold_at_127() {
        let truth = GrayImage::from_pixel(2, 1, Luma([128]));
        let computed = GrayImage::from_pixel(2, 1, Luma([127]));
        let m = compare_masks(&truth, &computed).unwrap();
        assert_eq!(m.false_negatives, 2);
        assert_eq!(m.true_positives, 0);
    }

    #[test]
    fn test_dimension_mismatch() {
        assert!(matches!(
            compare_masks(&GrayImage::new(4, 4), &GrayImage::new(4, 5)),
            Err(ForensicsError::DimensionMismatch { expected: (4, 4), found: (4, 5) })
        ));
    }
}
