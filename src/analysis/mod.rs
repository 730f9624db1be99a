pub mod dbscan;
pub mod mask;
pub mod matching;
pub mod metrics;

pub use dbscan::{Cluster, Clustering, DbscanParams};
pub use mask::{GrowthParams, HullPair, MaskGrowth};
pub use matching::{MatchStrategy, Matcher, Matches};
pub use metrics::MaskMetrics;
