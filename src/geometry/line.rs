use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ForensicsError, Result};

use super::{Pixel, Point2};

/// Segment between two matched interest points.
///
/// Besides its endpoints the line caches two representations which are
/// recomputed whenever the endpoints move:
/// - cartesian `a * x + b * y + c = 0`
/// - normal (polar) `rho = x * cos(theta) + y * sin(theta)`
///
/// Two lines are equal iff their cartesian coefficients are identical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    start: Point2,
    end: Point2,
    a: f64,
    b: f64,
    c: f64,
    rho: f64,
    theta: f64,
}

impl Line {
    pub fn new(start: Point2, end: Point2) -> Self {
        let mut line = Self {
            start,
            end,
            a: 0.0,
            b: 0.0,
            c: 0.0,
            rho: 0.0,
            theta: 0.0,
        };
        line.update();
        line
    }

    fn update(&mut self) {
        self.compute_cartesian();
        self.compute_polar();
    }

    fn compute_cartesian(&mut self) {
        self.a = self.start.y - self.end.y;
        self.b = self.end.x - self.start.x;
        self.c = -self.a * self.start.x - self.b * self.start.y;
    }

    fn compute_polar(&mut self) {
        let foot = self.orthogonal_foot();
        self.rho = foot.norm();
        self.theta = foot.y.atan2(foot.x);
    }

    pub fn start(&self) -> Point2 {
        self.start
    }

    pub fn end(&self) -> Point2 {
        self.end
    }

    pub fn coefficients(&self) -> (f64, f64, f64) {
        (self.a, self.b, self.c)
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn length(&self) -> f64 {
        self.start.distance(&self.end)
    }

    pub fn distance_to_origin(&self) -> f64 {
        self.c.abs() / self.a.hypot(self.b)
    }

    pub fn orthogonal_foot(&self) -> Point2 {
        let nrm = self.a * self.a + self.b * self.b;
        Point2::new(-self.a * self.c / nrm, -self.b * self.c / nrm)
    }

    pub fn orthogonal(&self) -> Line {
        Line::new(Point2::default(), self.orthogonal_foot())
    }

    pub fn director(&self) -> (f64, f64) {
        (-self.b, self.a)
    }

    pub fn slope(&self) -> Option<f64> {
        if self.b != 0.0 {
            Some(-self.a / self.b)
        } else {
            None
        }
    }

    /// Intersection of the two supporting lines, `None` when parallel or identical.
    pub fn intersect(&self, other: &Line) -> Option<Point2> {
        let (d1x, d1y) = self.director();
        let (d2x, d2y) = other.director();
        if d1x * d2y == d1y * d2x {
            return None;
        }

        let det = self.a * other.b - other.a * self.b;
        let x = (self.b * other.c - other.b * self.c) / det;
        let y = (other.a * self.c - self.a * other.c) / det;

        Some(Point2::new(x, y))
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        let offset = Point2::new(dx, dy);
        self.start = self.start + offset;
        self.end = self.end + offset;
        self.update();
    }

    pub fn invert(&mut self) {
        std::mem::swap(&mut self.start, &mut self.end);
        self.update();
    }

    pub fn is_close(&self, other: &Line, rho_threshold: f64, theta_threshold: f64) -> bool {
        (self.rho - other.rho).abs() <= rho_threshold && (self.theta - other.theta).abs() <= theta_threshold
    }

    /// Position of the endpoint matched with `pixel`, comparing endpoints at pixel precision.
    pub fn counterpart(&self, pixel: Pixel) -> Result<Point2> {
        if self.start.round() == pixel {
            Ok(self.end)
        } else if self.end.round() == pixel {
            Ok(self.start)
        } else {
            Err(ForensicsError::PointNotInLine { x: pixel.x, y: pixel.y })
        }
    }

    pub fn to_cartesian_string(&self) -> String {
        format!(
            "(({}, {}), ({}, {}))",
            self.start.x, self.start.y, self.end.x, self.end.y
        )
    }

    pub fn to_clustering_string(&self) -> String {
        format!("{},{},{},{}", self.start.x, self.start.y, self.theta, self.length())
    }
}

impl PartialEq for Line {
    fn eq(&self, other: &Self) -> bool {
        self.a == other.a && self.b == other.b && self.c == other.c
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.rho, self.theta, self.length())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterTag {
    Unclassified,
    Noise,
    Cluster(u32),
}

impl ClusterTag {
    /// Numeric encoding: -1 unclassified, -2 noise, cluster ids from 1.
    pub fn as_id(&self) -> i64 {
        match self {
            ClusterTag::Unclassified => -1,
            ClusterTag::Noise => -2,
            ClusterTag::Cluster(id) => *id as i64,
        }
    }

    pub fn cluster_id(&self) -> Option<u32> {
        match self {
            ClusterTag::Cluster(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteredLine {
    pub line: Line,
    pub tag: ClusterTag,
}

impl ClusteredLine {
    pub fn new(line: Line) -> Self {
        Self {
            line,
            tag: ClusterTag::Unclassified,
        }
    }
}

impl From<Line> for ClusteredLine {
    fn from(line: Line) -> Self {
        Self::new(line)
    }
}
