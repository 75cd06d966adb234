use async_trait::async_trait;
use thiserror::Error;

use crate::models::{GroupInvitation, Match, PairKey, Swipe, ViewingProposal};

/// Errors surfaced by the persistence collaborator.
///
/// The engine performs exactly one persistence attempt per call; retry
/// and backoff are the caller's responsibility.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Durable storage for Swipe, Match, GroupInvitation and ViewingProposal
/// records, keyed by id with secondary lookup by user membership.
///
/// Implementations: [`crate::services::MemoryStore`] for in-process
/// deployments and tests, [`crate::services::PostgresStore`] for durable
/// multi-instance deployments.
#[async_trait]
pub trait EngineStore: Send + Sync {
    /// Liveness probe for the health endpoint.
    async fn health_check(&self) -> bool {
        true
    }

    // Swipes (last-write-wins per ordered pair)
    async fn upsert_swipe(&self, swipe: Swipe) -> Result<(), StoreError>;
    async fn get_swipe(&self, swiper_id: &str, target_id: &str)
        -> Result<Option<Swipe>, StoreError>;

    /// Insert a match. For pairwise matches this is a compare-and-swap on
    /// the normalized pair key: if a match for the pair already exists the
    /// existing record is returned instead of a duplicate being created.
    async fn insert_match(&self, m: Match) -> Result<Match, StoreError>;
    async fn update_match(&self, m: &Match) -> Result<(), StoreError>;
    async fn get_match(&self, id: &str) -> Result<Option<Match>, StoreError>;
    async fn find_pair_match(&self, key: &PairKey) -> Result<Option<Match>, StoreError>;
    /// All matches containing the user, newest first.
    async fn matches_for_user(&self, user_id: &str) -> Result<Vec<Match>, StoreError>;

    async fn insert_invitation(&self, invitation: GroupInvitation) -> Result<(), StoreError>;
    async fn update_invitation(&self, invitation: &GroupInvitation) -> Result<(), StoreError>;
    async fn get_invitation(&self, id: &str) -> Result<Option<GroupInvitation>, StoreError>;
    /// Invitations with stored status `pending` for a group. Expiry is not
    /// evaluated here; the invitation manager applies the lazy check.
    async fn pending_invitations_for_group(
        &self,
        group_id: &str,
    ) -> Result<Vec<GroupInvitation>, StoreError>;
    /// All invitations addressed to the user, newest first.
    async fn invitations_for_invitee(
        &self,
        invitee_id: &str,
    ) -> Result<Vec<GroupInvitation>, StoreError>;

    async fn insert_proposal(&self, proposal: ViewingProposal) -> Result<(), StoreError>;
    async fn update_proposal(&self, proposal: &ViewingProposal) -> Result<(), StoreError>;
    async fn get_proposal(&self, id: &str) -> Result<Option<ViewingProposal>, StoreError>;
    /// All proposals for a match, newest first.
    async fn proposals_for_match(
        &self,
        match_id: &str,
    ) -> Result<Vec<ViewingProposal>, StoreError>;
}
