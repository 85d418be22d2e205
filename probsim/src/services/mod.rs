mod batch;
mod maintenance;

pub use batch::{BatchOptions, ItemOutcome, RunSummary, SimilarityBatchRunner};
pub use maintenance::{ListedEdge, MaintenanceService};
