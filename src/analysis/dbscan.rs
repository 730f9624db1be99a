use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ForensicsError, Result},
    geometry::{ClusterTag, ClusteredLine, Line},
};

/// Clusters with fewer lines than this are discarded.
pub const MIN_CLUSTER_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DbscanParams {
    pub min_pts: usize,
    pub epsilon: f64,
    pub wx: f64,
    pub wy: f64,
    pub wtheta: f64,
}

impl Default for DbscanParams {
    fn default() -> Self {
        Self {
            min_pts: 10,
            epsilon: 0.5,
            wx: 0.25,
            wy: 0.25,
            wtheta: 0.25,
        }
    }
}

impl DbscanParams {
    pub fn wl(&self) -> f64 {
        1.0 - self.wx - self.wy - self.wtheta
    }
}

pub fn is_degenerate(line: &Line) -> bool {
    line.theta() == 0.0 || !line.theta().is_finite() || line.length() == 0.0 || !line.length().is_finite()
}

/// DBSCAN over segments seen as `(x, y, theta, length)`, with `(x, y)`
/// the start of the segment.
pub struct Dbscan {
    params: DbscanParams,
    lines: Vec<ClusteredLine>,
    size_ratio: f64,
}

impl Dbscan {
    pub fn new(params: DbscanParams, lines: Vec<Line>, height: u32, width: u32) -> Result<Self> {
        let size_ratio = (height as u64 + width as u64) / 2;
        if size_ratio == 0 {
            return Err(ForensicsError::InvalidParameter(
                "Image size must be positive to normalise positions".into()
            ));
        }

        Ok(Self {
            params,
            lines: lines.into_iter().map(ClusteredLine::from).collect(),
            size_ratio: size_ratio as f64,
        })
    }

    pub fn lines(&self) -> &[ClusteredLine] {
        &self.lines
    }

    /// Weighted distance from `core` to `target`.
    ///
    /// Positions are normalised by the mean image side, orientation and
    /// length by the core's own theta and length. The result is therefore
    /// not symmetric, and a negative theta may turn it into NaN.
    pub fn distance(&self, core: &Line, target: &Line) -> Result<f64> {
        if is_degenerate(core) {
            return Err(ForensicsError::DegenerateLine {
                theta: core.theta(),
                length: core.length(),
            });
        }

        let p = &self.params;
        let (c, t) = (core.start(), target.start());

        let squared = p.wx * (c.x - t.x).powi(2) / self.size_ratio
            + p.wy * (c.y - t.y).powi(2) / self.size_ratio
            + p.wtheta * (core.theta() - target.theta()).powi(2) / core.theta()
            + p.wl() * (core.length() - target.length()).powi(2) / core.length();

        Ok(squared.sqrt())
    }

    fn region_query(&self, core: usize) -> Result<Vec<usize>> {
        let core = &self.lines[core].line;
        let mut neighbours = Vec::new();

        for (idx, target) in self.lines.iter().enumerate() {
            if self.distance(core, &target.line)? <= self.params.epsilon {
                neighbours.push(idx);
            }
        }

        Ok(neighbours)
    }

    /// Grows cluster `id` from the `idx`-th line. Returns false when the line
    /// is not dense enough and has been marked as noise.
    fn expand(&mut self, idx: usize, id: u32) -> Result<bool> {
        let seeds = self.region_query(idx)?;

        if seeds.len() < self.params.min_pts {
            self.lines[idx].tag = ClusterTag::Noise;
            return Ok(false);
        }

        let tag = ClusterTag::Cluster(id);
        for &seed in &seeds {
            self.lines[seed].tag = tag;
        }

        let mut worklist = seeds.into_iter().filter(|&s| s != idx).collect::<Vec<_>>();
        let mut k = 0;
        while k < worklist.len() {
            let neighbours = self.region_query(worklist[k])?;

            if neighbours.len() >= self.params.min_pts {
                for n in neighbours {
                    match self.lines[n].tag {
                        ClusterTag::Unclassified => {
                            self.lines[n].tag = tag;
                            worklist.push(n);
                        }
                        ClusterTag::Noise => self.lines[n].tag = tag,
                        ClusterTag::Cluster(_) => {}
                    }
                }
            }
            k += 1;
        }

        trace!("Cluster {} reached {} lines", id, worklist.len() + 1);
        Ok(true)
    }

    pub fn run(mut self) -> Result<Vec<ClusteredLine>> {
        let mut id = 1;

        for idx in 0..self.lines.len() {
            if self.lines[idx].tag == ClusterTag::Unclassified && self.expand(idx, id)? {
                id += 1;
            }
        }

        for clustered in &self.lines {
            trace!("{},{}", clustered.line.to_clustering_string(), clustered.tag.as_id());
        }

        Ok(self.lines)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: u32,
    pub lines: Vec<Line>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Clustering {
    pub clusters: Vec<Cluster>,
    /// Noise lines of the last attempt.
    pub outliers: Vec<Line>,
    pub min_pts_used: usize,
    pub attempts: usize,
}

fn group(tagged: Vec<ClusteredLine>) -> (Vec<Cluster>, Vec<Line>) {
    let count = tagged
        .iter()
        .filter_map(|l| l.tag.cluster_id())
        .max()
        .unwrap_or(0);

    let mut clusters = (1..=count)
        .map(|id| Cluster { id, lines: Vec::new() })
        .collect::<Vec<_>>();
    let mut outliers = Vec::new();

    for clustered in tagged {
        match clustered.tag.cluster_id() {
            Some(id) => clusters[id as usize - 1].lines.push(clustered.line),
            None => outliers.push(clustered.line),
        }
    }

    clusters.retain(|c| c.len() >= MIN_CLUSTER_SIZE);
    (clusters, outliers)
}

/// Clusters `lines`, halving `min_pts` and starting over from the untagged
/// lines while no cluster of at least [`MIN_CLUSTER_SIZE`] lines is found.
/// Gives up once `min_pts` drops below 2, returning no cluster.
pub fn cluster_lines(lines: &[Line], params: &DbscanParams, height: u32, width: u32) -> Result<Clustering> {
    let mut min_pts = params.min_pts;
    let mut clustering = Clustering {
        clusters: Vec::new(),
        outliers: lines.to_vec(),
        min_pts_used: min_pts,
        attempts: 0,
    };

    while min_pts >= 2 {
        debug!(
            "Starting scanner with minPts = {} and epsilon = {}",
            min_pts, params.epsilon
        );

        let scanner = Dbscan::new(DbscanParams { min_pts, ..*params }, lines.to_vec(), height, width)?;
        let (clusters, outliers) = group(scanner.run()?);

        clustering = Clustering {
            clusters,
            outliers,
            min_pts_used: min_pts,
            attempts: clustering.attempts + 1,
        };

        if !clustering.clusters.is_empty() {
            debug!("Computed {} clusters", clustering.clusters.len());
            return Ok(clustering);
        }

        debug!("No cluster found");
        min_pts /= 2;
    }

    Ok(clustering)
}
