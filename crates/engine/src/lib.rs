pub mod cycle;
pub mod executor;
pub mod feeds;
pub mod upbit;

pub use cycle::{CycleHandle, CycleOutcome, CycleRunner, CycleServices};
pub use executor::{OrderExecutor, OrderOutcome};
pub use feeds::{FearGreedClient, NoNews, SerpApiNews};
pub use upbit::UpbitClient;
