use serde::Serialize;

use crate::models::domain::ProposedTime;

/// Domain events emitted by the engine. The surrounding application
/// consumes these to send auto-messages and push notifications; the
/// engine itself never talks to the messaging service.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DomainEvent {
    MatchCreated {
        match_id: String,
        users: Vec<String>,
    },
    GroupMatchCreated {
        match_id: String,
        users: Vec<String>,
        created_by: String,
    },
    MemberJoined {
        match_id: String,
        user_id: String,
    },
    ProposalConfirmed {
        proposal_id: String,
        match_id: String,
        time: ProposedTime,
    },
}
