use serde::{Deserialize, Serialize};

use crate::models::domain::{GroupInvitation, Match, Swipe, ViewingProposal};

/// Response for the record-swipe endpoint. `matched` is set when the
/// swipe completed a mutual like.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSwipeResponse {
    pub swipe: Swipe,
    #[serde(rename = "match")]
    pub matched: Option<Match>,
}

/// Response listing a user's matches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchListResponse {
    pub matches: Vec<Match>,
    pub count: usize,
}

/// Response listing a user's open invitations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationListResponse {
    pub invitations: Vec<GroupInvitation>,
    pub count: usize,
}

/// Response listing a match's viewing proposals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalListResponse {
    pub proposals: Vec<ViewingProposal>,
    pub count: usize,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
