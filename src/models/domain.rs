use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Smallest allowed group match (below this a match is pairwise).
pub const MIN_GROUP_SIZE: usize = 3;
/// Largest allowed match membership.
pub const MAX_GROUP_SIZE: usize = 5;

/// Directional swipe action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeAction {
    Like,
    Pass,
    Superlike,
}

impl SwipeAction {
    /// Like and superlike count toward mutual-like detection
    pub fn is_positive(self) -> bool {
        matches!(self, SwipeAction::Like | SwipeAction::Superlike)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SwipeAction::Like => "like",
            SwipeAction::Pass => "pass",
            SwipeAction::Superlike => "superlike",
        }
    }
}

impl FromStr for SwipeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "like" => Ok(SwipeAction::Like),
            "pass" => Ok(SwipeAction::Pass),
            "superlike" => Ok(SwipeAction::Superlike),
            other => Err(format!("unknown swipe action: {}", other)),
        }
    }
}

/// Directional swipe record, unique per (swiper, target).
/// A later swipe from the same pair overwrites the decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Swipe {
    #[serde(rename = "swiperId")]
    pub swiper_id: String,
    #[serde(rename = "targetId")]
    pub target_id: String,
    pub action: SwipeAction,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Order-insensitive key for a pair of users.
///
/// Match creation serializes on this key, so both `(a, b)` and `(b, a)`
/// map to the same critical section.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey(String, String);

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self(a.to_string(), b.to_string())
        } else {
            Self(b.to_string(), a.to_string())
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0, self.1)
    }
}

/// A match between 2-5 users.
///
/// Two members is a pairwise match; three or more is a group match, which
/// additionally carries `average_compatibility`, `created_by` and an
/// optional `invite_code`. Membership only ever grows (via invitation
/// acceptance); the sole other mutation is the `blocked` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub users: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub blocked: bool,
    #[serde(rename = "groupName", default)]
    pub group_name: Option<String>,
    #[serde(rename = "averageCompatibility", default)]
    pub average_compatibility: Option<f64>,
    #[serde(rename = "memberCount", default)]
    pub member_count: usize,
    #[serde(rename = "createdBy", default)]
    pub created_by: Option<String>,
    #[serde(rename = "inviteCode", default)]
    pub invite_code: Option<String>,
}

impl Match {
    pub fn is_group(&self) -> bool {
        self.users.len() >= MIN_GROUP_SIZE
    }

    pub fn has_member(&self, user_id: &str) -> bool {
        self.users.iter().any(|u| u == user_id)
    }

    /// Pair key for pairwise matches; groups have none.
    pub fn pair_key(&self) -> Option<PairKey> {
        if self.users.len() == 2 {
            Some(PairKey::new(&self.users[0], &self.users[1]))
        } else {
            None
        }
    }
}

/// Invitation lifecycle state. Expiry is not a stored state: a pending
/// invitation past `expires_at` is treated as expired at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
}

impl InvitationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Declined => "declined",
        }
    }
}

impl FromStr for InvitationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InvitationStatus::Pending),
            "accepted" => Ok(InvitationStatus::Accepted),
            "declined" => Ok(InvitationStatus::Declined),
            other => Err(format!("unknown invitation status: {}", other)),
        }
    }
}

/// Invitation to join an existing group match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupInvitation {
    pub id: String,
    #[serde(rename = "groupId")]
    pub group_id: String,
    #[serde(rename = "inviterId")]
    pub inviter_id: String,
    #[serde(rename = "inviteeId")]
    pub invitee_id: String,
    pub status: InvitationStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
}

impl GroupInvitation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == InvitationStatus::Pending && now > self.expires_at
    }

    /// Pending and not yet expired, i.e. still acceptable.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.status == InvitationStatus::Pending && now <= self.expires_at
    }
}

/// Member response to a proposed viewing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Unavailable,
    Maybe,
}

impl Availability {
    pub fn as_str(self) -> &'static str {
        match self {
            Availability::Available => "available",
            Availability::Unavailable => "unavailable",
            Availability::Maybe => "maybe",
        }
    }
}

impl FromStr for Availability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(Availability::Available),
            "unavailable" => Ok(Availability::Unavailable),
            "maybe" => Ok(Availability::Maybe),
            other => Err(format!("unknown availability: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ProposalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Confirmed => "confirmed",
            ProposalStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ProposalStatus::Pending)
    }
}

impl FromStr for ProposalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProposalStatus::Pending),
            "confirmed" => Ok(ProposalStatus::Confirmed),
            "cancelled" => Ok(ProposalStatus::Cancelled),
            other => Err(format!("unknown proposal status: {}", other)),
        }
    }
}

/// One candidate slot in a viewing proposal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedTime {
    pub datetime: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A member's answer to a proposal. At most one per user; a later
/// response replaces the earlier one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewingResponse {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub response: Availability,
    #[serde(rename = "selectedTimeIndex", default)]
    pub selected_time_index: Option<usize>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Multi-party negotiation record for scheduling a room viewing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewingProposal {
    pub id: String,
    #[serde(rename = "matchId")]
    pub match_id: String,
    #[serde(rename = "proposedBy")]
    pub proposed_by: String,
    #[serde(rename = "proposedTimes")]
    pub proposed_times: Vec<ProposedTime>,
    #[serde(default)]
    pub responses: Vec<ViewingResponse>,
    pub status: ProposalStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl ViewingProposal {
    pub fn response_for(&self, user_id: &str) -> Option<&ViewingResponse> {
        self.responses.iter().find(|r| r.user_id == user_id)
    }

    /// Insert or replace the response for `response.user_id`.
    pub fn upsert_response(&mut self, response: ViewingResponse) {
        if let Some(existing) = self
            .responses
            .iter_mut()
            .find(|r| r.user_id == response.user_id)
        {
            *existing = response;
        } else {
            self.responses.push(response);
        }
    }
}

/// User record from the profile directory (external entity)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub city: String,
    #[serde(default)]
    pub university: Option<String>,
    #[serde(default)]
    pub paused: bool,
    #[serde(rename = "isBanned", default)]
    pub is_banned: bool,
}

/// How a user lives day to day. Scales run 1 (low) to 5 (high);
/// undisclosed fields are `None` and never scored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifestyleRecord {
    #[serde(default)]
    pub cleanliness: Option<u8>,
    #[serde(rename = "sleepSchedule", default)]
    pub sleep_schedule: Option<SleepSchedule>,
    #[serde(rename = "noiseTolerance", default)]
    pub noise_tolerance: Option<u8>,
    #[serde(rename = "guestFrequency", default)]
    pub guest_frequency: Option<u8>,
    #[serde(default)]
    pub smoking: Option<bool>,
    #[serde(default)]
    pub pets: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepSchedule {
    Early,
    Late,
    Flexible,
}

/// Housing constraints used for budget and neighborhood overlap
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HousingRecord {
    #[serde(rename = "budgetMin", default)]
    pub budget_min: Option<u32>,
    #[serde(rename = "budgetMax", default)]
    pub budget_max: Option<u32>,
    #[serde(default)]
    pub neighborhoods: Vec<String>,
}

/// Soft preferences: diet, hobbies and languages
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferenceRecord {
    #[serde(rename = "dietaryPreferences", default)]
    pub dietary: Vec<String>,
    #[serde(default)]
    pub hobbies: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
}

/// Everything the scorer needs about one user. Any sub-record may be
/// missing entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileBundle {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub lifestyle: Option<LifestyleRecord>,
    #[serde(default)]
    pub housing: Option<HousingRecord>,
    #[serde(default)]
    pub preferences: Option<PreferenceRecord>,
}

/// Scorer output: clamped 0-100 score plus human-readable reasons
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityResult {
    pub score: f64,
    pub reasons: Vec<String>,
}

/// Per-dimension scoring weights. Defaults sum to 100 so each weight is
/// the dimension's maximum contribution in score points.
#[derive(Debug, Clone, Copy)]
pub struct ScoringWeights {
    pub cleanliness: f64,
    pub sleep: f64,
    pub noise: f64,
    pub guests: f64,
    pub smoking: f64,
    pub pets: f64,
    pub dietary: f64,
    pub hobbies: f64,
    pub languages: f64,
    pub budget: f64,
    pub neighborhood: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            cleanliness: 12.0,
            sleep: 12.0,
            noise: 10.0,
            guests: 8.0,
            smoking: 10.0,
            pets: 8.0,
            dietary: 8.0,
            hobbies: 12.0,
            languages: 6.0,
            budget: 8.0,
            neighborhood: 6.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_is_order_insensitive() {
        assert_eq!(PairKey::new("alice", "bob"), PairKey::new("bob", "alice"));
        assert_eq!(PairKey::new("alice", "bob").to_string(), "alice:bob");
    }

    #[test]
    fn test_swipe_action_parsing() {
        assert_eq!("superlike".parse::<SwipeAction>().unwrap(), SwipeAction::Superlike);
        assert!("nope".parse::<SwipeAction>().is_err());
        assert!(SwipeAction::Superlike.is_positive());
        assert!(!SwipeAction::Pass.is_positive());
    }

    #[test]
    fn test_invitation_expiry_is_lazy() {
        let now = Utc::now();
        let invitation = GroupInvitation {
            id: "inv1".to_string(),
            group_id: "g1".to_string(),
            inviter_id: "alice".to_string(),
            invitee_id: "bob".to_string(),
            status: InvitationStatus::Pending,
            created_at: now - chrono::Duration::days(8),
            expires_at: now - chrono::Duration::days(1),
        };

        assert!(invitation.is_expired(now));
        assert!(!invitation.is_open(now));

        let accepted = GroupInvitation {
            status: InvitationStatus::Accepted,
            ..invitation
        };
        assert!(!accepted.is_expired(now));
    }

    #[test]
    fn test_response_upsert_replaces() {
        let mut proposal = ViewingProposal {
            id: "p1".to_string(),
            match_id: "m1".to_string(),
            proposed_by: "alice".to_string(),
            proposed_times: vec![],
            responses: vec![],
            status: ProposalStatus::Pending,
            created_at: Utc::now(),
        };

        proposal.upsert_response(ViewingResponse {
            user_id: "bob".to_string(),
            response: Availability::Maybe,
            selected_time_index: Some(1),
            notes: None,
        });
        proposal.upsert_response(ViewingResponse {
            user_id: "bob".to_string(),
            response: Availability::Available,
            selected_time_index: Some(0),
            notes: None,
        });

        assert_eq!(proposal.responses.len(), 1);
        assert_eq!(proposal.response_for("bob").unwrap().selected_time_index, Some(0));
    }
}
