use std::path::Path;

use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};

use crate::{
    DetectorOptions,
    analysis::{Clustering, HullPair},
    detection::DetectionResult,
    error::Result,
    features::InterestPoints,
    geometry::{Line, Pixel},
    image_utils::is_on,
};

#[derive(Debug, Clone)]
pub struct VisualizationConfig {
    pub keypoint_color: Rgb<u8>,
    pub match_color: Rgb<u8>,
    pub outlier_color: Rgb<u8>,
    pub truth_color: Rgb<u8>,
    pub expanded_color: Rgb<u8>,
    pub keypoint_radius: i32,
    pub overlay_opacity: f32,
    pub show_keypoints: bool,
    pub show_matches: bool,
    pub show_clusters: bool,
    pub show_hulls: bool,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            keypoint_color: Rgb([255, 255, 0]),
            match_color: Rgb([0, 255, 255]),
            outlier_color: Rgb([128, 128, 128]),
            truth_color: Rgb([0, 255, 0]),
            expanded_color: Rgb([255, 0, 0]),
            keypoint_radius: 3,
            overlay_opacity: 0.5,
            show_keypoints: true,
            show_matches: true,
            show_clusters: true,
            show_hulls: true,
        }
    }
}

impl VisualizationConfig {
    /// Default colours, views enabled by the draw toggles of `options`.
    pub fn from_options(options: &DetectorOptions) -> Self {
        Self {
            show_keypoints: options.draw_keypoints,
            show_matches: options.draw_matches,
            show_clusters: options.draw_clusters,
            show_hulls: options.draw_hulls,
            ..Self::default()
        }
    }
}

pub struct Visualizer {
    config: VisualizationConfig,
}

impl Visualizer {
    pub fn new() -> Self {
        Self { config: VisualizationConfig::default() }
    }

    pub fn with_config(config: VisualizationConfig) -> Self {
        Self { config }
    }

    pub fn draw_keypoints(&self, original: &RgbImage, points: &InterestPoints) -> RgbImage {
        let mut result = original.clone();

        for kp in points.keypoints() {
            draw_hollow_circle_mut(
                &mut result,
                (kp.x.round() as i32, kp.y.round() as i32),
                self.config.keypoint_radius,
                self.config.keypoint_color,
            );
        }

        result
    }

    pub fn draw_matches(&self, original: &RgbImage, lines: &[Line]) -> RgbImage {
        let mut result = original.clone();

        for line in lines {
            self.draw_line(&mut result, line, self.config.match_color);
        }

        result
    }

    /// One hue per cluster, outliers in grey.
    pub fn draw_clusters(&self, original: &RgbImage, clustering: &Clustering) -> RgbImage {
        let mut result = original.clone();

        for line in &clustering.outliers {
            self.draw_line(&mut result, line, self.config.outlier_color);
        }

        for (i, cluster) in clustering.clusters.iter().enumerate() {
            let hue = (i as f32 * 137.5) % 360.0;
            let color = hsv_to_rgb(hue, 1.0, 1.0);

            for line in &cluster.lines {
                self.draw_line(&mut result, line, color);
            }
        }

        result
    }

    /// Both hulls of every pair, each pair with its own hue.
    pub fn draw_hulls(&self, original: &RgbImage, hulls: &[HullPair]) -> RgbImage {
        let mut result = original.clone();

        for (i, pair) in hulls.iter().enumerate() {
            let hue = (i as f32 * 137.5) % 360.0;
            let color = hsv_to_rgb(hue, 1.0, 1.0);

            self.draw_polygon(&mut result, &pair.source.positions(), color);
            self.draw_polygon(&mut result, &pair.target.positions(), color);
        }

        result
    }

    pub fn overlay_mask(&self, original: &RgbImage, mask: &GrayImage, color: Rgb<u8>) -> RgbImage {
        let mut result = original.clone();
        let alpha = self.config.overlay_opacity;

        for (x, y, pixel) in result.enumerate_pixels_mut() {
            if x < mask.width() && y < mask.height() && is_on(mask.get_pixel(x, y)[0]) {
                for c in 0..3 {
                    pixel[c] = ((1.0 - alpha) * pixel[c] as f32 + alpha * color[c] as f32) as u8;
                }
            }
        }

        result
    }

    /// Ground truth in green, expanded mask in red, overlap in yellow.
    pub fn compare_masks(&self, truth: &GrayImage, expanded: &GrayImage) -> RgbImage {
        let (width, height) = expanded.dimensions();
        let mut comparison = RgbImage::new(width, height);

        for (x, y, pixel) in comparison.enumerate_pixels_mut() {
            let in_truth = x < truth.width() && y < truth.height() && is_on(truth.get_pixel(x, y)[0]);
            let in_expanded = is_on(expanded.get_pixel(x, y)[0]);

            let mut color = Rgb([0, 0, 0]);
            if in_truth {
                color = self.config.truth_color;
            }
            if in_expanded {
                let e = self.config.expanded_color;
                color = Rgb([color[0].max(e[0]), color[1].max(e[1]), color[2].max(e[2])]);
            }
            *pixel = color;
        }

        comparison
    }

    /// Every view the configuration enables, plus the masks.
    pub fn render(
        &self,
        original: &RgbImage,
        result: &DetectionResult,
        truth: Option<&GrayImage>,
    ) -> CopyMoveVisualization {
        let mut views = Vec::new();

        if self.config.show_keypoints {
            views.push(("keypoints".to_string(), self.draw_keypoints(original, &result.interest_points)));
        }
        if self.config.show_matches {
            views.push(("matches".to_string(), self.draw_matches(original, &result.lines)));
        }
        if self.config.show_clusters {
            views.push(("clusters".to_string(), self.draw_clusters(original, &result.clustering)));
        }
        if self.config.show_hulls {
            views.push(("hulls".to_string(), self.draw_hulls(original, &result.hulls)));
        }

        views.push((
            "mask".to_string(),
            self.overlay_mask(original, &result.expanded_mask, self.config.expanded_color),
        ));
        if let Some(truth) = truth {
            views.push(("comparison".to_string(), self.compare_masks(truth, &result.expanded_mask)));
        }

        CopyMoveVisualization {
            original: original.clone(),
            views,
        }
    }

    pub fn create_comparison(&self, images: &[(&str, &RgbImage)]) -> RgbImage {
        if images.is_empty() {
            return RgbImage::new(1, 1);
        }

        let padding = 10u32;
        let label_height = 20u32;

        let max_height = images
            .iter()
            .map(|(_, img)| img.height())
            .max()
            .unwrap_or(0);

        let total_width = images
            .iter()
            .map(|(_, img)| img.width())
            .sum::<u32>() + padding * (images.len() as u32 + 1);
        let total_height = max_height + label_height + padding * 2;

        let mut result = RgbImage::from_pixel(total_width, total_height, Rgb([40, 40, 40]));

        let mut x_offset = padding;
        for (label, img) in images {
            self.draw_label(&mut result, x_offset, padding / 2, label, Rgb([255, 255, 255]));
            copy_image_to(&mut result, img, x_offset, label_height + padding);
            x_offset += img.width() + padding;
        }

        result
    }

    fn draw_line(&self, image: &mut RgbImage, line: &Line, color: Rgb<u8>) {
        let (start, end) = (line.start(), line.end());
        draw_line_segment_mut(
            image,
            (start.x as f32, start.y as f32),
            (end.x as f32, end.y as f32),
            color,
        );
    }

    fn draw_polygon(&self, image: &mut RgbImage, points: &[Pixel], color: Rgb<u8>) {
        if points.is_empty() {
            return;
        }

        for (i, a) in points.iter().enumerate() {
            let b = points[(i + 1) % points.len()];
            draw_line_segment_mut(image, (a.x as f32, a.y as f32), (b.x as f32, b.y as f32), color);
        }
    }

    fn draw_label(&self, image: &mut RgbImage, x: u32, y: u32, text: &str, color: Rgb<u8>) {
        let (width, height) = image.dimensions();
        let char_width = 6;
        let char_height = 8;

        let bg_width = (text.len() * char_width + 4) as u32;
        let bg_height = (char_height + 4) as u32;

        for dy in 0..bg_height {
            for dx in 0..bg_width {
                let (px, py) = (x + dx, y + dy);
                if px < width && py < height {
                    image.put_pixel(px, py, Rgb([0, 0, 0]));
                }
            }
        }

        for i in 0..text.chars().count() {
            let cx = x + 2 + (i * char_width) as u32;
            let cy = y + 2;

            for dy in 0..(char_height as u32) {
                for dx in 0..((char_width - 1) as u32) {
                    let (px, py) = (cx + dx, cy + dy);
                    if px < width && py < height {
                        image.put_pixel(px, py, color);
                    }
                }
            }
        }
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    Rgb([
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    ])
}

fn copy_image_to(dest: &mut RgbImage, src: &RgbImage, offset_x: u32, offset_y: u32) {
    let (dest_w, dest_h) = dest.dimensions();

    for (x, y, pixel) in src.enumerate_pixels() {
        let (dx, dy) = (offset_x + x, offset_y + y);
        if dx < dest_w && dy < dest_h {
            dest.put_pixel(dx, dy, *pixel);
        }
    }
}

pub struct CopyMoveVisualization {
    pub original: RgbImage,
    /// Named views, in drawing order.
    pub views: Vec<(String, RgbImage)>,
}

impl CopyMoveVisualization {
    pub fn save_all<P: AsRef<Path>>(&self, directory: P, stem: &str) -> Result<()> {
        let directory = directory.as_ref();
        std::fs::create_dir_all(directory)?;

        for (name, view) in &self.views {
            view.save(directory.join(format!("{}_{}.png", stem, name)))?;
        }

        Ok(())
    }

    pub fn create_report_image(&self) -> RgbImage {
        let visualizer = Visualizer::new();
        let mut images = vec![("original", &self.original)];
        images.extend(self.views.iter().map(|(name, view)| (name.as_str(), view)));
        visualizer.create_comparison(&images)
    }
}

#[cfg(test)]
mod tests {
    use image::Luma;

    use super::*;
    use crate::geometry::Point2;

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), Rgb([255, 0, 0]));
        assert_eq!(hsv_to_rgb(120.0, 1.0, 1.0), Rgb([0, 255, 0]));
        assert_eq!(hsv_to_rgb(240.0, 1.0, 1.0), Rgb([0, 0, 255]));
    }

    #[test]
    fn test_compare_masks_colors() {
        let truth = GrayImage::from_fn(4, 1, |x, _| Luma([if x < 2 { 255 } else { 0 }]));
        let expanded = GrayImage::from_fn(4, 1, |x, _| Luma([if x % 2 == 1 { 255 } else { 0 }]));
        let view = Visualizer::new().compare_masks(&truth, &expanded);

        assert_eq!(view.get_pixel(0, 0), &Rgb([0, 255, 0]));
        assert_eq!(view.get_pixel(1, 0), &Rgb([255, 255, 0]));
        assert_eq!(view.get_pixel(2, 0), &Rgb([0, 0, 0]));
        assert_eq!(view.get_pixel(3, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_draw_matches_marks_endpoints() {
        let image = RgbImage::new(20, 20);
        let line = Line::new(Point2::new(2.0, 3.0), Point2::new(15.0, 3.0));
        let view = Visualizer::new().draw_matches(&image, &[line]);

        assert_eq!(view.get_pixel(2, 3), &Rgb([0, 255, 255]));
        assert_eq!(view.get_pixel(15, 3), &Rgb([0, 255, 255]));
        assert_eq!(view.get_pixel(8, 10), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_toggles_select_views() {
        let options = DetectorOptions {
            draw_matches: true,
            ..DetectorOptions::default()
        };
        let config = VisualizationConfig::from_options(&options);
        assert!(config.show_matches);
        assert!(!config.show_keypoints && !config.show_clusters && !config.show_hulls);
    }

    #[test]
    fn test_overlay_mask_blends_only_on_pixels() {
        let image = RgbImage::from_pixel(2, 1, Rgb([100, 100, 100]));
        let mask = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 255 } else { 0 }]));
        let view = Visualizer::new().overlay_mask(&image, &mask, Rgb([200, 0, 0]));

        assert_eq!(view.get_pixel(0, 0), &Rgb([150, 50, 50]));
        assert_eq!(view.get_pixel(1, 0), &Rgb([100, 100, 100]));
    }
}
