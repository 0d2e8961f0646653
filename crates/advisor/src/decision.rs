use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use common::{Decision, DecisionService, InvalidDecision, TradeAction};
use strategy::MarketSnapshot;

use crate::prompt::{decision_context, decision_prompt};

/// Wire shape the decision service must answer with. Unknown keys are an error.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDecision {
    decision: String,
    percentage: i64,
    reason: String,
}

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("decision payload is not a valid decision object: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("decision payload violates the schema: {0}")]
    Invalid(#[from] InvalidDecision),
}

/// Parse a decision service reply into a [`Decision`].
///
/// The reply must be exactly one JSON object (surrounding whitespace aside)
/// of the form `{"decision": "buy"|"sell"|"hold", "percentage": n, "reason": "..."}`.
/// Anything else (markdown fences, prose, extra keys, out-of-range sizes)
/// is rejected; no partial decision is ever returned.
pub fn parse_decision(payload: &str) -> Result<Decision, DecisionError> {
    let raw: RawDecision = serde_json::from_str(payload.trim())?;
    let action: TradeAction = raw.decision.parse()?;
    Ok(Decision::new(action, raw.percentage, raw.reason)?)
}

/// Why no decision came back from [`DecisionMaker::decide`].
#[derive(Debug, Error)]
pub enum DecideError {
    #[error("decision service call failed: {0}")]
    Service(#[from] common::Error),

    #[error("{source}")]
    Rejected {
        source: DecisionError,
        /// Reply exactly as received, for the audit log.
        raw: String,
    },
}

/// Wraps the decision service: builds the request, validates the reply.
pub struct DecisionMaker {
    service: Arc<dyn DecisionService>,
}

impl DecisionMaker {
    pub fn new(service: Arc<dyn DecisionService>) -> Self {
        Self { service }
    }

    /// One request per call; a reply that fails validation is never retried.
    pub async fn decide(
        &self,
        snapshot: &MarketSnapshot,
        reflection: &str,
    ) -> Result<Decision, DecideError> {
        let prompt = decision_prompt(snapshot, reflection);
        let context = decision_context(snapshot)?;

        let raw = self.service.complete(&prompt, &context).await?;
        match parse_decision(&raw) {
            Ok(decision) => {
                info!(
                    action = %decision.action(),
                    size_percent = decision.size_percent(),
                    reason = %decision.rationale(),
                    "Decision received"
                );
                Ok(decision)
            }
            Err(source) => {
                error!(error = %source, raw = %raw, "Rejected decision payload");
                Err(DecideError::Rejected { source, raw })
            }
        }
    }
}
