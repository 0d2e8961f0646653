mod health;
mod ledger;

pub use health::health_router;
pub use ledger::ledger_router;
