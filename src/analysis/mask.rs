use image::{GrayImage, Luma, RgbImage};
use imageproc::{
    drawing::{draw_line_segment_mut, draw_polygon_mut},
    point::Point,
};
use log::{debug, trace};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ForensicsError, Result},
    geometry::{Line, Pixel, convex_hull_indices, raster::paired_walk},
    image_utils::{MASK_ON, luma_plane},
};

use super::dbscan::Cluster;

/// A hull vertex and the line it was taken from, so that the matched
/// endpoint stays recoverable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HullVertex {
    pub position: Pixel,
    pub line: Line,
}

impl HullVertex {
    pub fn counterpart(&self) -> Result<Pixel> {
        Ok(self.line.counterpart(self.position)?.round())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hull {
    pub vertices: Vec<HullVertex>,
}

impl Hull {
    fn from_endpoints(endpoints: &[(Pixel, &Line)]) -> Self {
        let positions = endpoints.iter().map(|(p, _)| *p).collect::<Vec<_>>();
        let vertices = convex_hull_indices(&positions)
            .into_iter()
            .map(|i| HullVertex {
                position: endpoints[i].0,
                line: endpoints[i].1.clone(),
            })
            .collect();

        Self { vertices }
    }

    pub fn positions(&self) -> Vec<Pixel> {
        self.vertices.iter().map(|v| v.position).collect()
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HullPair {
    pub cluster_id: u32,
    pub source: Hull,
    pub target: Hull,
}

pub fn build_hulls(clusters: &[Cluster]) -> Vec<HullPair> {
    clusters
        .iter()
        .map(|cluster| {
            let starts = cluster
                .lines
                .iter()
                .map(|l| (l.start().round(), l))
                .collect::<Vec<_>>();
            let ends = cluster
                .lines
                .iter()
                .map(|l| (l.end().round(), l))
                .collect::<Vec<_>>();

            let pair = HullPair {
                cluster_id: cluster.id,
                source: Hull::from_endpoints(&starts),
                target: Hull::from_endpoints(&ends),
            };
            debug!(
                "Cluster {}: initial hull contains {} points, matching hull {} points",
                cluster.id,
                pair.source.len(),
                pair.target.len()
            );
            pair
        })
        .collect()
}

fn fill_polygon(mask: &mut GrayImage, points: &[Pixel]) {
    let mut poly = points.iter().map(|&p| Point::from(p)).collect::<Vec<Point<i32>>>();
    poly.dedup();
    if poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }

    let on = Luma([MASK_ON]);
    match poly.as_slice() {
        [] => {}
        [p] => {
            if p.x >= 0 && p.y >= 0 && (p.x as u32) < mask.width() && (p.y as u32) < mask.height() {
                mask.put_pixel(p.x as u32, p.y as u32, on);
            }
        }
        [a, b] => draw_line_segment_mut(mask, (a.x as f32, a.y as f32), (b.x as f32, b.y as f32), on),
        _ => draw_polygon_mut(mask, &poly, on),
    }
}

pub fn fill_hulls(width: u32, height: u32, hulls: &[HullPair]) -> GrayImage {
    let mut mask = GrayImage::new(width, height);

    for pair in hulls {
        fill_polygon(&mut mask, &pair.source.positions());
        fill_polygon(&mut mask, &pair.target.positions());
    }

    mask
}

/// Pixels of the ellipse inscribed in the `ksize` square centred on
/// `center`, clipped to the image. Visited column by column.
pub fn neighbours(center: Pixel, width: u32, height: u32, ksize: u32) -> Vec<Pixel> {
    let radius = (ksize / 2) as i32;
    let (width, height) = (width as i32, height as i32);

    let min_x = (center.x - radius).max(0);
    let min_y = (center.y - radius).max(0);
    let max_x = (center.x + radius).min(width - 1);
    let max_y = (center.y + radius).min(height - 1);

    let mut coordinates = Vec::new();
    for x in min_x..=max_x {
        for y in min_y..=max_y {
            let (dx, dy) = ((x - center.x) as f64, (y - center.y) as f64);
            if dx.hypot(dy) <= radius as f64 {
                coordinates.push(Pixel::new(x, y));
            }
        }
    }

    coordinates
}

/// Pixels on the border of a hull given as `(vertex, counterpart)` pairs,
/// each paired with the matching pixel on the border of the counterpart
/// hull. Consecutive vertices are joined by a lockstep walk, and the last
/// pixel is joined back to the first.
pub fn border_of_hull(hull: &[(Pixel, Pixel)]) -> Vec<(Pixel, Pixel)> {
    if hull.len() < 2 {
        return hull.to_vec();
    }

    let mut pts = Vec::new();
    for w in hull.windows(2) {
        let ((one, match_one), (two, match_two)) = (w[0], w[1]);

        pts.push((one, match_one));
        pts.extend(paired_walk(one, two, match_one, match_two));
        pts.push((two, match_two));
    }

    let (one, match_one) = pts[pts.len() - 1];
    let (two, match_two) = pts[0];
    pts.extend(paired_walk(one, two, match_one, match_two));

    trace!("Hull border contains {} points", pts.len());
    pts
}

#[derive(Debug, Clone)]
pub struct EqmCheck {
    pub eqm: f64,
    pub psnr: f64,
    pub at_border: bool,
    pub added: Vec<(Pixel, Pixel)>,
}

/// Compares the neighbourhoods of `one` and `two` on the luma plane.
///
/// Window pixels are paired by position, up to the smaller window. When the
/// PSNR reaches `psnr_threshold` every pair is switched on in `mask` and
/// returned; otherwise the pair sits on the border of the forgery and only
/// pairs of identical luma are switched on.
pub fn check_eqm(
    plane: &Array2<f64>,
    mask: &mut GrayImage,
    one: Pixel,
    two: Pixel,
    ksize: u32,
    psnr_threshold: f64,
) -> EqmCheck {
    let (width, height) = mask.dimensions();
    let pairs = neighbours(one, width, height, ksize)
        .into_iter()
        .zip(neighbours(two, width, height, ksize))
        .collect::<Vec<_>>();

    if pairs.is_empty() {
        return EqmCheck {
            eqm: f64::NAN,
            psnr: f64::NAN,
            at_border: true,
            added: Vec::new(),
        };
    }

    let luma = |p: Pixel| plane[[p.y as usize, p.x as usize]];
    let eqm = pairs
        .iter()
        .map(|&(a, b)| (luma(a) - luma(b)).powi(2))
        .sum::<f64>()
        / pairs.len() as f64;
    let psnr = 10.0 * (255.0 * 255.0 / eqm).ln();
    trace!("EQM = {}. PSNR = {}", eqm, psnr);

    let at_border = psnr < psnr_threshold;
    let added = pairs
        .into_iter()
        .filter(|&(a, b)| !at_border || luma(a) == luma(b))
        .collect::<Vec<_>>();

    let on = Luma([MASK_ON]);
    for &(a, b) in &added {
        mask.put_pixel(a.x as u32, a.y as u32, on);
        mask.put_pixel(b.x as u32, b.y as u32, on);
    }

    EqmCheck {
        eqm,
        psnr,
        at_border,
        added,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthParams {
    pub psnr_threshold: f64,
    pub ksize: u32,
    pub max_iterations: usize,
    /// Keep a copy of the mask after every pass that changed it. Each copy
    /// holds a full `W x H` buffer, up to `max_iterations` per hull pair.
    pub keep_steps: bool,
}

impl Default for GrowthParams {
    fn default() -> Self {
        Self {
            psnr_threshold: 150.0,
            ksize: 13,
            max_iterations: 20,
            keep_steps: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MaskGrowth {
    pub mask: GrayImage,
    /// Mask after every pass that switched pixels on, when requested.
    pub steps: Vec<GrayImage>,
    /// Passes run for each hull pair.
    pub iterations: Vec<usize>,
}

/// Grows `initial` outwards from the border of every source hull.
///
/// Each pass checks every border pair, then recomputes the hull of the
/// border and the pairs just added and walks its border again. A hull pair
/// stops once a pass only meets border locations or after
/// `max_iterations` passes. Pixels are only ever switched on.
pub fn grow_mask(
    image: &RgbImage,
    initial: &GrayImage,
    hulls: &[HullPair],
    params: &GrowthParams,
) -> Result<MaskGrowth> {
    if params.ksize % 2 == 0 {
        return Err(ForensicsError::InvalidParameter(format!(
            "Expansion window must be odd, got {}",
            params.ksize
        )));
    }
    if image.dimensions() != initial.dimensions() {
        return Err(ForensicsError::DimensionMismatch {
            expected: image.dimensions(),
            found: initial.dimensions(),
        });
    }

    let plane = luma_plane(image);
    let mut mask = initial.clone();
    let mut steps = Vec::new();
    let mut iterations = Vec::with_capacity(hulls.len());

    for pair in hulls {
        let seed = pair
            .source
            .vertices
            .iter()
            .map(|v| Ok((v.position, v.counterpart()?)))
            .collect::<Result<Vec<_>>>()?;
        let mut border = border_of_hull(&seed);

        let mut finished = false;
        let mut pass = 0;
        while !finished && pass < params.max_iterations {
            finished = true;
            let mut new_points = border.clone();

            for &(one, two) in &border {
                let check = check_eqm(&plane, &mut mask, one, two, params.ksize, params.psnr_threshold);
                if !check.at_border {
                    finished = false;
                }
                new_points.extend(check.added);
            }

            let starts = new_points.iter().map(|(p, _)| *p).collect::<Vec<_>>();
            let new_hull = convex_hull_indices(&starts)
                .into_iter()
                .map(|i| new_points[i])
                .collect::<Vec<_>>();
            border = border_of_hull(&new_hull);

            if params.keep_steps && steps.last().unwrap_or(initial) != &mask {
                steps.push(mask.clone());
            }
            pass += 1;
        }

        debug!("Cluster {}: mask grown in {} passes", pair.cluster_id, pass);
        iterations.push(pass);
    }

    Ok(MaskGrowth {
        mask,
        steps,
        iterations,
    })
}
