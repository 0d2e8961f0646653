pub mod guard;
pub mod sizing;

pub use guard::{RunGuard, RunPermit};
pub use sizing::{OrderPlan, SizingPolicy, SkipReason};
