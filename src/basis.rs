//! The branch/flow forest and the tracking heuristics built on it.
pub mod branch;
pub mod flow;
pub mod tracker;

pub use branch::{new_leaves, Branch};
pub use flow::Flow;
pub use tracker::{Greedy, NoTracking, Policy, Tracker, WellMixed};
