pub mod decision;
pub mod openai;
pub mod prompt;
pub mod reflection;

pub use decision::{parse_decision, DecideError, DecisionError, DecisionMaker};
pub use openai::OpenAiClient;
pub use reflection::{PerformanceReflector, Reflection};
