use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::domain::ProposedTime;

/// Request to record a swipe
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordSwipeRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "swiper_id", rename = "swiperId")]
    pub swiper_id: String,
    #[validate(length(min = 1))]
    #[serde(alias = "target_id", rename = "targetId")]
    pub target_id: String,
    #[serde(alias = "action", rename = "action")]
    pub action: String,
}

/// Request to create a group match explicitly
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 3, max = 5))]
    pub users: Vec<String>,
    #[serde(alias = "groupName", rename = "groupName", default)]
    pub group_name: Option<String>,
    #[validate(length(min = 1))]
    #[serde(alias = "created_by", rename = "createdBy")]
    pub created_by: String,
}

/// Request to invite a user into a group match
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InviteRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "group_id", rename = "groupId")]
    pub group_id: String,
    #[validate(length(min = 1))]
    #[serde(alias = "inviter_id", rename = "inviterId")]
    pub inviter_id: String,
    #[validate(length(min = 1))]
    #[serde(alias = "invitee_id", rename = "inviteeId")]
    pub invitee_id: String,
}

/// Acting-user body for accept/decline/cancel style operations
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ActingUserRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
}

/// Request to open a viewing proposal
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateProposalRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "match_id", rename = "matchId")]
    pub match_id: String,
    #[validate(length(min = 1))]
    #[serde(alias = "proposed_by", rename = "proposedBy")]
    pub proposed_by: String,
    #[serde(alias = "proposedTimes", rename = "proposedTimes")]
    pub proposed_times: Vec<ProposedTime>,
}

/// Request to respond to a viewing proposal
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RespondRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    #[serde(alias = "response", rename = "response")]
    pub response: String,
    #[serde(alias = "selectedTimeIndex", rename = "selectedTimeIndex", default)]
    pub selected_time_index: Option<usize>,
    #[serde(default)]
    pub notes: Option<String>,
}
