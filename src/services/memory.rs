use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::{GroupInvitation, Match, PairKey, Swipe, ViewingProposal};
use crate::services::store::{EngineStore, StoreError};

/// In-process store backed by `RwLock`-guarded maps.
///
/// This is the arena the engine runs against when no database is
/// configured, and the fixture every test suite uses. Pairwise matches
/// are additionally indexed by normalized pair key so match creation can
/// compare-and-swap instead of scanning.
#[derive(Default)]
pub struct MemoryStore {
    swipes: RwLock<HashMap<(String, String), Swipe>>,
    matches: RwLock<HashMap<String, Match>>,
    pair_index: RwLock<HashMap<PairKey, String>>,
    invitations: RwLock<HashMap<String, GroupInvitation>>,
    proposals: RwLock<HashMap<String, ViewingProposal>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EngineStore for MemoryStore {
    async fn upsert_swipe(&self, swipe: Swipe) -> Result<(), StoreError> {
        let key = (swipe.swiper_id.clone(), swipe.target_id.clone());
        self.swipes.write().await.insert(key, swipe);
        Ok(())
    }

    async fn get_swipe(
        &self,
        swiper_id: &str,
        target_id: &str,
    ) -> Result<Option<Swipe>, StoreError> {
        let key = (swiper_id.to_string(), target_id.to_string());
        Ok(self.swipes.read().await.get(&key).cloned())
    }

    async fn insert_match(&self, m: Match) -> Result<Match, StoreError> {
        if let Some(key) = m.pair_key() {
            let mut index = self.pair_index.write().await;
            if let Some(existing_id) = index.get(&key) {
                if let Some(existing) = self.matches.read().await.get(existing_id) {
                    return Ok(existing.clone());
                }
            }
            index.insert(key, m.id.clone());
        }
        self.matches.write().await.insert(m.id.clone(), m.clone());
        Ok(m)
    }

    async fn update_match(&self, m: &Match) -> Result<(), StoreError> {
        if m.pair_key().is_none() {
            // A pair that grew into a group no longer occupies the pair slot
            self.pair_index.write().await.retain(|_, id| id != &m.id);
        }
        self.matches.write().await.insert(m.id.clone(), m.clone());
        Ok(())
    }

    async fn get_match(&self, id: &str) -> Result<Option<Match>, StoreError> {
        Ok(self.matches.read().await.get(id).cloned())
    }

    async fn find_pair_match(&self, key: &PairKey) -> Result<Option<Match>, StoreError> {
        let index = self.pair_index.read().await;
        match index.get(key) {
            Some(id) => Ok(self.matches.read().await.get(id).cloned()),
            None => Ok(None),
        }
    }

    async fn matches_for_user(&self, user_id: &str) -> Result<Vec<Match>, StoreError> {
        let mut result: Vec<Match> = self
            .matches
            .read()
            .await
            .values()
            .filter(|m| m.has_member(user_id))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn insert_invitation(&self, invitation: GroupInvitation) -> Result<(), StoreError> {
        self.invitations
            .write()
            .await
            .insert(invitation.id.clone(), invitation);
        Ok(())
    }

    async fn update_invitation(&self, invitation: &GroupInvitation) -> Result<(), StoreError> {
        self.invitations
            .write()
            .await
            .insert(invitation.id.clone(), invitation.clone());
        Ok(())
    }

    async fn get_invitation(&self, id: &str) -> Result<Option<GroupInvitation>, StoreError> {
        Ok(self.invitations.read().await.get(id).cloned())
    }

    async fn pending_invitations_for_group(
        &self,
        group_id: &str,
    ) -> Result<Vec<GroupInvitation>, StoreError> {
        Ok(self
            .invitations
            .read()
            .await
            .values()
            .filter(|inv| {
                inv.group_id == group_id
                    && inv.status == crate::models::InvitationStatus::Pending
            })
            .cloned()
            .collect())
    }

    async fn invitations_for_invitee(
        &self,
        invitee_id: &str,
    ) -> Result<Vec<GroupInvitation>, StoreError> {
        let mut result: Vec<GroupInvitation> = self
            .invitations
            .read()
            .await
            .values()
            .filter(|inv| inv.invitee_id == invitee_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn insert_proposal(&self, proposal: ViewingProposal) -> Result<(), StoreError> {
        self.proposals
            .write()
            .await
            .insert(proposal.id.clone(), proposal);
        Ok(())
    }

    async fn update_proposal(&self, proposal: &ViewingProposal) -> Result<(), StoreError> {
        self.proposals
            .write()
            .await
            .insert(proposal.id.clone(), proposal.clone());
        Ok(())
    }

    async fn get_proposal(&self, id: &str) -> Result<Option<ViewingProposal>, StoreError> {
        Ok(self.proposals.read().await.get(id).cloned())
    }

    async fn proposals_for_match(
        &self,
        match_id: &str,
    ) -> Result<Vec<ViewingProposal>, StoreError> {
        let mut result: Vec<ViewingProposal> = self
            .proposals
            .read()
            .await
            .values()
            .filter(|p| p.match_id == match_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }
}
