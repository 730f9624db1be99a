use std::ops::Index;

use super::{Feature, InterestPoint, KeyPoint};

#[derive(Debug, Clone, Copy)]
pub struct Neighbor<'a> {
    pub distance: f64,
    pub point: &'a InterestPoint,
}

/// The interest points of one image, viewed through two orderings:
/// by orientation angle and by descriptor norm.
///
/// Points live once in an arena; the orderings are permutations of arena
/// indices and every point records its rank in both. Unless stated
/// otherwise "the i-th point" means rank `i` of the angle ordering.
#[derive(Debug, Clone, Default)]
pub struct InterestPoints {
    points: Vec<InterestPoint>,
    by_angle: Vec<usize>,
    by_norm: Vec<usize>,
    angle_threshold: f64,
    norm_threshold: f64,
}

impl InterestPoints {
    pub fn new(features: Vec<Feature>, angle_threshold: f64, norm_threshold: f64) -> Self {
        let points = features.into_iter().map(InterestPoint::new).collect::<Vec<_>>();
        let n = points.len();

        let mut index = Self {
            points,
            by_angle: (0..n).collect(),
            by_norm: (0..n).collect(),
            angle_threshold,
            norm_threshold,
        };
        index.sort();
        index
    }

    /// Stable-sorts both orderings and rewrites every point's ranks.
    pub fn sort(&mut self) {
        let points = &self.points;
        self.by_norm.sort_by(|&a, &b| points[a].norm().total_cmp(&points[b].norm()));
        self.by_angle.sort_by(|&a, &b| points[a].angle().total_cmp(&points[b].angle()));

        for rank in 0..self.points.len() {
            let (a, n) = (self.by_angle[rank], self.by_norm[rank]);
            self.points[a].set_angle_idx(rank);
            self.points[n].set_norm_idx(rank);
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn angle_threshold(&self) -> f64 {
        self.angle_threshold
    }

    pub fn norm_threshold(&self) -> f64 {
        self.norm_threshold
    }

    pub fn get(&self, i: usize) -> Option<&InterestPoint> {
        self.by_angle.get(i).map(|&p| &self.points[p])
    }

    pub fn get_by_norm(&self, i: usize) -> Option<&InterestPoint> {
        self.by_norm.get(i).map(|&p| &self.points[p])
    }

    pub fn iter(&self) -> impl Iterator<Item = &InterestPoint> {
        self.by_angle.iter().map(move |&p| &self.points[p])
    }

    pub fn iter_by_norm(&self) -> impl Iterator<Item = &InterestPoint> {
        self.by_norm.iter().map(move |&p| &self.points[p])
    }

    pub fn keypoints(&self) -> Vec<KeyPoint> {
        self.iter().map(|p| *p.keypoint()).collect()
    }

    pub fn range_angle(&self, pt: &InterestPoint) -> (usize, usize) {
        self.range(&self.by_angle, pt.angle_idx(), |a, b| (a.angle() - b.angle()).abs(), self.angle_threshold)
    }

    pub fn range_norm(&self, pt: &InterestPoint) -> (usize, usize) {
        self.range(&self.by_norm, pt.norm_idx(), |a, b| (a.norm() - b.norm()).abs(), self.norm_threshold)
    }

    /// Scans outwards from rank `i` while the neighbour stays within
    /// `threshold`. The point itself is always part of the window.
    fn range<F>(&self, order: &[usize], i: usize, comp: F, threshold: f64) -> (usize, usize)
    where
        F: Fn(&InterestPoint, &InterestPoint) -> f64,
    {
        if order.is_empty() {
            return (0, 0);
        }

        let pt = &self.points[order[i]];

        let mut min_idx = i;
        while min_idx > 0 && comp(pt, &self.points[order[min_idx - 1]]) < threshold {
            min_idx -= 1;
        }

        let mut max_idx = i;
        while max_idx + 1 < order.len() && comp(pt, &self.points[order[max_idx + 1]]) < threshold {
            max_idx += 1;
        }

        (min_idx, max_idx)
    }

    /// Norm window centred on `center` reaching as far as `end` on both
    /// sides, clipped to valid ranks.
    pub fn relative_range_norm(&self, center: &InterestPoint, end: &InterestPoint) -> (usize, usize) {
        if self.is_empty() {
            return (0, 0);
        }

        let center_idx = center.norm_idx() as isize;
        let end_idx = end.norm_idx() as isize;

        let (min_idx, max_idx) = if end_idx < center_idx {
            (end_idx, 2 * center_idx - end_idx)
        } else {
            (2 * center_idx - end_idx, end_idx)
        };

        let last = self.len() as isize - 1;
        (min_idx.clamp(0, last) as usize, max_idx.clamp(0, last) as usize)
    }

    /// Descriptor distances from `pt` to every other point of the angle
    /// ranks in `window` (all ranks when `None`), nearest first.
    pub fn similarity_angle(&self, pt: &InterestPoint, window: Option<(usize, usize)>) -> Vec<Neighbor<'_>> {
        let Some((min_idx, max_idx)) = self.clip(window) else {
            return Vec::new();
        };

        let neighbors = (min_idx..=max_idx)
            .filter(|&j| j != pt.angle_idx())
            .map(|j| {
                let other = &self.points[self.by_angle[j]];
                Neighbor {
                    distance: pt.descriptor_distance(other),
                    point: other,
                }
            })
            .collect();

        Self::rank_by_distance(neighbors)
    }

    /// Same as [`similarity_angle`](Self::similarity_angle) over norm ranks,
    /// skipping candidates whose own norm exceeds the norm threshold.
    pub fn similarity_norm(&self, pt: &InterestPoint, window: Option<(usize, usize)>) -> Vec<Neighbor<'_>> {
        let Some((min_idx, max_idx)) = self.clip(window) else {
            return Vec::new();
        };

        let neighbors = (min_idx..=max_idx)
            .filter(|&j| j != pt.norm_idx())
            .map(|j| &self.points[self.by_norm[j]])
            .filter(|other| other.norm() <= self.norm_threshold)
            .map(|other| Neighbor {
                distance: pt.descriptor_distance(other),
                point: other,
            })
            .collect();

        Self::rank_by_distance(neighbors)
    }

    fn clip(&self, window: Option<(usize, usize)>) -> Option<(usize, usize)> {
        if self.is_empty() {
            return None;
        }

        let (min_idx, max_idx) = window.unwrap_or((0, self.len() - 1));
        let max_idx = max_idx.min(self.len() - 1);

        (min_idx <= max_idx).then_some((min_idx, max_idx))
    }

    /// Sorts by ascending distance; candidates sharing a distance collapse
    /// into one entry, the one scanned last.
    fn rank_by_distance(mut neighbors: Vec<Neighbor<'_>>) -> Vec<Neighbor<'_>> {
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        neighbors.dedup_by(|later, kept| {
            if later.distance == kept.distance {
                *kept = *later;
                true
            } else {
                false
            }
        });
        neighbors
    }
}

impl Index<usize> for InterestPoints {
    type Output = InterestPoint;

    fn index(&self, i: usize) -> &InterestPoint {
        &self.points[self.by_angle[i]]
    }
}
