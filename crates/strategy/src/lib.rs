pub mod config;
pub mod indicators;
pub mod snapshot;

pub use config::{
    ExecutionConfig, FeedConfig, MarketConfig, ReflectionConfig, ScheduleConfig,
    StrategyFileConfig,
};
pub use indicators::{IndicatorBar, IndicatorEngine, IndicatorSet};
pub use snapshot::{MarketSnapshot, SnapshotBuilder, SnapshotSources};
