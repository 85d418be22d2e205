mod problem;
mod similarity;

pub use problem::*;
pub use similarity::*;
