use log::{debug, trace};
use rayon::{ThreadPoolBuilder, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ForensicsError, Result},
    features::{InterestPoint, InterestPoints, Neighbor},
    geometry::Line,
};

pub const G2NN_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchStrategy {
    /// Every other point is a candidate. Quadratic, kept as a reference.
    Exhaustive,
    #[default]
    AngleWindow,
    NormWindow,
}

/// Match table indexed by angle rank. Each entry lists the angle ranks of
/// the points matched with it; at most one per point under the g2NN policy.
#[derive(Debug, Clone, Default)]
pub struct Matches {
    table: Vec<Vec<usize>>,
}

impl Matches {
    pub fn from_table(table: Vec<Vec<usize>>) -> Self {
        Self { table }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn matched(&self, i: usize) -> &[usize] {
        self.table.get(i).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.table
            .iter()
            .enumerate()
            .flat_map(|(i, matched)| matched.iter().map(move |&j| (i, j)))
    }

    pub fn pair_count(&self) -> usize {
        self.table.iter().map(Vec::len).sum()
    }
}

/// Applies the ratio test to a distance-ranked candidate list.
///
/// The nearest candidate is accepted only when it is decisively closer than
/// the second one. With fewer than two candidates there is no decision to
/// make and nothing is accepted; `0 / 0` is NaN and is rejected as well.
pub fn ratio_test<'a>(neighbors: &[Neighbor<'a>]) -> Option<Neighbor<'a>> {
    match neighbors {
        [first, second, ..] if first.distance / second.distance < G2NN_RATIO => Some(*first),
        _ => None,
    }
}

pub struct Matcher<'a> {
    points: &'a InterestPoints,
    strategy: MatchStrategy,
}

impl<'a> Matcher<'a> {
    pub fn new(points: &'a InterestPoints, strategy: MatchStrategy) -> Self {
        Self { points, strategy }
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    pub fn compute_match(&self, i: usize) -> Vec<usize> {
        let pt = &self.points[i];
        let similarity = self.points.similarity_angle(pt, None);
        self.accept(pt, &similarity)
    }

    pub fn compute_better_match(&self, i: usize) -> Vec<usize> {
        let pt = &self.points[i];
        let window = self.points.range_angle(pt);
        trace!("Point {} angle window [{}, {}]", i, window.0, window.1);

        let similarity = self.points.similarity_angle(pt, Some(window));
        self.accept(pt, &similarity)
    }

    pub fn compute_norm_match(&self, i: usize) -> Vec<usize> {
        let pt = &self.points[i];
        let window = self.points.range_norm(pt);
        trace!("Point {} norm window [{}, {}]", i, window.0, window.1);

        let similarity = self.points.similarity_norm(pt, Some(window));
        self.accept(pt, &similarity)
    }

    pub fn match_point(&self, i: usize) -> Vec<usize> {
        match self.strategy {
            MatchStrategy::Exhaustive => self.compute_match(i),
            MatchStrategy::AngleWindow => self.compute_better_match(i),
            MatchStrategy::NormWindow => self.compute_norm_match(i),
        }
    }

    fn accept(&self, pt: &InterestPoint, similarity: &[Neighbor<'_>]) -> Vec<usize> {
        match ratio_test(similarity) {
            Some(best) if best.point.angle_idx() != pt.angle_idx() => {
                trace!(
                    "Point {} at ({}, {}) matched with point {} (distance {})",
                    pt.angle_idx(),
                    pt.keypoint().x,
                    pt.keypoint().y,
                    best.point.angle_idx(),
                    best.distance
                );
                vec![best.point.angle_idx()]
            }
            _ => Vec::new(),
        }
    }

    /// Matches every point using a pool of `jobs` threads built for this
    /// pass only.
    ///
    /// The table is split into `jobs` contiguous chunks of `ceil(n / jobs)`
    /// points, each chunk written by a single task. Mirrored pairs are
    /// removed once all tasks have joined.
    pub fn run(&self, jobs: usize) -> Result<Matches> {
        if jobs == 0 {
            return Err(ForensicsError::InvalidParameter(
                "Number of jobs must be at least 1".into()
            ));
        }

        let n = self.points.len();
        let mut table = vec![Vec::new(); n];
        if n == 0 {
            return Ok(Matches::from_table(table));
        }

        let chunk = n.div_ceil(jobs);
        debug!(
            "Matching {} points with {} threads ({} points by thread, {:?})",
            n, jobs, chunk, self.strategy
        );

        let pool = ThreadPoolBuilder::new().num_threads(jobs).build()?;
        pool.install(|| {
            table
                .par_chunks_mut(chunk)
                .enumerate()
                .for_each(|(k, slots)| {
                    let start = k * chunk;
                    debug!("Worker on interval [{}, {}[", start, start + slots.len());
                    for (offset, slot) in slots.iter_mut().enumerate() {
                        *slot = self.match_point(start + offset);
                    }
                });
        });

        dedup_symmetric(&mut table);

        let matches = Matches::from_table(table);
        debug!("Found {} matches", matches.pair_count());

        Ok(matches)
    }
}

/// Drops `i -> j` whenever `j -> i` was already registered by an earlier point.
///
/// Visiting points in ascending order reproduces what a single sequential
/// pass checking the previously computed lists would keep.
pub fn dedup_symmetric(table: &mut [Vec<usize>]) {
    for i in 0..table.len() {
        let (done, rest) = table.split_at_mut(i);
        rest[0].retain(|&j| !(j < i && done[j].contains(&i)));
    }
}

/// Builds one line per accepted match, oriented so that its start is the
/// lexicographically smaller endpoint, and drops lines shorter than
/// `min_length`.
pub fn build_lines(points: &InterestPoints, matches: &Matches, min_length: f64) -> Vec<Line> {
    let mut lines = Vec::with_capacity(matches.pair_count());

    for (i, j) in matches.pairs() {
        let origin = points[i].position();
        let other = points[j].position();

        let mut line = Line::new(origin, other);
        trace!("Created line {} of length {}", line.to_cartesian_string(), line.length());

        if other.lex_le(&origin) {
            line.invert();
        }
        if line.length() >= min_length {
            lines.push(line);
        }
    }

    debug!("Built {} lines from {} matches", lines.len(), matches.pair_count());
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Feature, KeyPoint};

    fn feature(x: f32, y: f32, angle: f32, descriptor: Vec<f32>) -> Feature {
        Feature::new(KeyPoint::new(x, y, angle), descriptor)
    }

    fn two_pairs() -> InterestPoints {
        InterestPoints::new(
            vec![
                feature(10.0, 10.0, 10.0, vec![1.0, 0.0, 0.0]),
                feature(110.0, 20.0, 10.5, vec![1.0, 0.01, 0.0]),
                feature(30.0, 200.0, 100.0, vec![0.0, 0.0, 1.0]),
                feature(150.0, 220.0, 100.5, vec![0.0, 0.02, 1.0]),
            ],
            4.0,
            1.2,
        )
    }

    fn neighbor(distance: f64, point: &InterestPoint) -> Neighbor<'_> {
        Neighbor { distance, point }
    }

    #[test]
    fn test_ratio_test_threshold() {
        let index = two_pairs();
        let (a, b) = (&index[0], &index[1]);

        assert!(ratio_test(&[neighbor(0.4, a), neighbor(1.0, b)]).is_some());
        assert!(ratio_test(&[neighbor(0.5, a), neighbor(1.0, b)]).is_none());
        assert!(ratio_test(&[neighbor(0.9, a), neighbor(1.0, b)]).is_none());
        assert!(ratio_test(&[neighbor(0.1, a)]).is_none());
        assert!(ratio_test(&[]).is_none());
        assert!(ratio_test(&[neighbor(0.0, a), neighbor(0.0, b)]).is_none());
        assert!(ratio_test(&[neighbor(0.0, a), neighbor(0.3, b)]).is_some());
    }

    #[test]
    fn test_exhaustive_matches_each_pair_once() {
        let index = two_pairs();
        let matches = Matcher::new(&index, MatchStrategy::Exhaustive).run(1).unwrap();

        assert_eq!(matches.len(), 4);
        assert_eq!(matches.pair_count(), 2);
        for (i, j) in matches.pairs() {
            assert_ne!(i, j);
            assert!(!matches.matched(j).contains(&i));
        }

        let lines = build_lines(&index, &matches, 0.0);
        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert!(line.start().lex_le(&line.end()));
        }
    }

    #[test]
    fn test_angle_window_without_second_candidate_emits_nothing() {
        let index = two_pairs();
        let matches = Matcher::new(&index, MatchStrategy::AngleWindow).run(2).unwrap();
        assert_eq!(matches.pair_count(), 0);
    }

    #[test]
    fn test_angle_window_with_distractor() {
        let mut features = vec![
            feature(10.0, 10.0, 10.0, vec![1.0, 0.0, 0.0]),
            feature(110.0, 20.0, 10.5, vec![1.0, 0.01, 0.0]),
            feature(60.0, 90.0, 11.0, vec![0.0, 1.0, 0.0]),
        ];
        // far away in angle, never inside the window
        features.push(feature(5.0, 5.0, 200.0, vec![1.0, 0.0, 0.0]));
        let index = InterestPoints::new(features, 4.0, 1.2);

        let matches = Matcher::new(&index, MatchStrategy::AngleWindow).run(1).unwrap();
        assert_eq!(matches.pair_count(), 1);
        let (i, j) = matches.pairs().next().unwrap();
        let xs = [index[i].keypoint().x, index[j].keypoint().x];
        assert!(xs.contains(&10.0) && xs.contains(&110.0));
    }

    #[test]
    fn test_identical_points_do_not_match() {
        let features = (0..6)
            .map(|k| feature(k as f32 * 20.0, 0.0, 45.0, vec![0.5, 0.5]))
            .collect();
        let index = InterestPoints::new(features, 4.0, 1.2);

        let sims = index.similarity_angle(&index[0], None);
        assert!(sims.iter().all(|n| n.distance == 0.0));

        for strategy in [MatchStrategy::Exhaustive, MatchStrategy::AngleWindow, MatchStrategy::NormWindow] {
            let matches = Matcher::new(&index, strategy).run(3).unwrap();
            assert_eq!(matches.pair_count(), 0);
        }
    }

    #[test]
    fn test_results_independent_of_job_count() {
        let features = (0..37)
            .map(|k| {
                let t = k as f32;
                let base = vec![(t * 0.37).sin(), (t * 0.11).cos(), (t * 0.05).sin()];
                feature(t * 7.0, (t * 13.0) % 90.0, (k % 5) as f32, base)
            })
            .chain((0..10).map(|k| {
                let t = k as f32;
                feature(300.0 + t, 300.0, (k % 5) as f32, vec![(t * 0.37).sin(), (t * 0.11).cos(), (t * 0.05).sin() + 0.001])
            }))
            .collect();
        let index = InterestPoints::new(features, 2.0, 1.2);
        let matcher = Matcher::new(&index, MatchStrategy::AngleWindow);

        let reference = matcher.run(1).unwrap();
        for jobs in [2, 3, 4, 8, 64] {
            let other = matcher.run(jobs).unwrap();
            assert_eq!(reference.pairs().collect::<Vec<_>>(), other.pairs().collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_zero_jobs_rejected() {
        let index = two_pairs();
        assert!(matches!(
            Matcher::new(&index, MatchStrategy::AngleWindow).run(0),
            Err(ForensicsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_dedup_symmetric() {
        let mut table = vec![vec![2], vec![], vec![0], vec![1]];
        dedup_symmetric(&mut table);
        assert_eq!(table, vec![vec![2], vec![], vec![], vec![1]]);
    }

    #[test]
    fn test_build_lines_filters_short_and_orients() {
        let index = two_pairs();
        // angle ranks: 0 -> (10,10), 1 -> (110,20), 2 -> (30,200), 3 -> (150,220)
        let matches = Matches::from_table(vec![vec![], vec![0], vec![], vec![2]]);

        let lines = build_lines(&index, &matches, 0.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].start().x, 10.0);
        assert_eq!(lines[0].end().x, 110.0);

        let long_only = build_lines(&index, &matches, 100.6);
        assert_eq!(long_only.len(), 1);
        assert_eq!(long_only[0].start().x, 30.0);
    }
}
