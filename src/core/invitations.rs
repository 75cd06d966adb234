use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::core::error::EngineError;
use crate::core::matches::MatchManager;
use crate::models::{GroupInvitation, InvitationStatus, Match, MAX_GROUP_SIZE};
use crate::services::{EngineStore, KeyedMutex, ProfileDirectory};

/// Manages invitations into existing group matches.
///
/// Lifecycle: pending, then accepted or declined. Expiry is never
/// stored; a pending invitation past `expires_at` is treated as expired
/// at the moment it is read, so no background timer exists. Membership
/// is only ever mutated through the match manager's append operation.
pub struct InvitationManager {
    store: Arc<dyn EngineStore>,
    directory: Arc<dyn ProfileDirectory>,
    matches: Arc<MatchManager>,
    locks: KeyedMutex,
    lifetime: Duration,
}

impl InvitationManager {
    pub fn new(
        store: Arc<dyn EngineStore>,
        directory: Arc<dyn ProfileDirectory>,
        matches: Arc<MatchManager>,
        lifetime_days: i64,
    ) -> Self {
        Self {
            store,
            directory,
            matches,
            locks: KeyedMutex::new(),
            lifetime: Duration::days(lifetime_days),
        }
    }

    pub async fn invite(
        &self,
        group_id: &str,
        inviter_id: &str,
        invitee_id: &str,
    ) -> Result<GroupInvitation, EngineError> {
        // Serialize invites per group so a capacity or duplicate check
        // cannot go stale between read and insert
        let _guard = self.locks.lock(group_id).await;

        let group = self
            .store
            .get_match(group_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("match {}", group_id)))?;

        if !group.has_member(inviter_id) {
            return Err(EngineError::NotGroupMember);
        }
        if group.users.len() >= MAX_GROUP_SIZE {
            return Err(EngineError::GroupFull);
        }
        if group.has_member(invitee_id) {
            return Err(EngineError::AlreadyMember);
        }

        let invitee = self
            .directory
            .get_user(invitee_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("user {}", invitee_id)))?;
        if invitee.is_banned {
            return Err(EngineError::InvalidState(format!(
                "user {} is banned",
                invitee_id
            )));
        }

        let now = Utc::now();
        let pending = self.store.pending_invitations_for_group(group_id).await?;
        if pending
            .iter()
            .any(|inv| inv.invitee_id == invitee_id && inv.is_open(now))
        {
            return Err(EngineError::DuplicateInvitation);
        }

        let invitation = GroupInvitation {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            inviter_id: inviter_id.to_string(),
            invitee_id: invitee_id.to_string(),
            status: InvitationStatus::Pending,
            created_at: now,
            expires_at: now + self.lifetime,
        };
        self.store.insert_invitation(invitation.clone()).await?;

        tracing::info!(
            "User {} invited {} to group {}",
            inviter_id,
            invitee_id,
            group_id
        );

        Ok(invitation)
    }

    /// Accept a pending, unexpired invitation. On success the invitee
    /// joins the group and the grown match is returned.
    pub async fn accept(
        &self,
        invitation_id: &str,
        acting_user_id: &str,
    ) -> Result<Match, EngineError> {
        let _guard = self.locks.lock(invitation_id).await;

        let mut invitation = self
            .store
            .get_invitation(invitation_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("invitation {}", invitation_id)))?;

        if invitation.invitee_id != acting_user_id {
            return Err(EngineError::NotInvitee);
        }
        if invitation.status != InvitationStatus::Pending {
            return Err(EngineError::InvalidState(format!(
                "invitation is {}",
                invitation.status.as_str()
            )));
        }
        if Utc::now() > invitation.expires_at {
            return Err(EngineError::InvitationExpired);
        }

        let group = self
            .matches
            .append_member(&invitation.group_id, acting_user_id)
            .await?;

        invitation.status = InvitationStatus::Accepted;
        self.store.update_invitation(&invitation).await?;

        tracing::info!(
            "User {} accepted invitation {} into group {}",
            acting_user_id,
            invitation_id,
            invitation.group_id
        );

        Ok(group)
    }

    /// Decline a pending invitation. Never touches group membership.
    pub async fn decline(
        &self,
        invitation_id: &str,
        acting_user_id: &str,
    ) -> Result<GroupInvitation, EngineError> {
        let _guard = self.locks.lock(invitation_id).await;

        let mut invitation = self
            .store
            .get_invitation(invitation_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("invitation {}", invitation_id)))?;

        if invitation.invitee_id != acting_user_id {
            return Err(EngineError::NotInvitee);
        }
        if invitation.status != InvitationStatus::Pending {
            return Err(EngineError::InvalidState(format!(
                "invitation is {}",
                invitation.status.as_str()
            )));
        }

        invitation.status = InvitationStatus::Declined;
        self.store.update_invitation(&invitation).await?;

        Ok(invitation)
    }

    /// Open (pending, unexpired) invitations addressed to the user,
    /// newest first.
    pub async fn invitations_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<GroupInvitation>, EngineError> {
        let now = Utc::now();
        let invitations = self.store.invitations_for_invitee(user_id).await?;
        Ok(invitations
            .into_iter()
            .filter(|inv| inv.is_open(now))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScoringWeights, UserRecord};
    use crate::services::{EventBus, MemoryStore, StaticDirectory};

    struct Fixture {
        store: Arc<MemoryStore>,
        matches: Arc<MatchManager>,
        invitations: InvitationManager,
    }

    async fn fixture(user_ids: &[&str]) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let directory = Arc::new(StaticDirectory::new());
        for user_id in user_ids {
            directory
                .insert_user(UserRecord {
                    user_id: user_id.to_string(),
                    city: "Berlin".to_string(),
                    university: None,
                    paused: false,
                    is_banned: false,
                })
                .await;
        }
        let (events, _rx) = EventBus::channel();
        let matches = Arc::new(MatchManager::new(
            store.clone(),
            directory.clone(),
            ScoringWeights::default(),
            1000,
            300,
            events,
        ));
        let invitations =
            InvitationManager::new(store.clone(), directory, matches.clone(), 7);
        Fixture {
            store,
            matches,
            invitations,
        }
    }

    async fn group_of(fixture: &Fixture, members: &[&str]) -> Match {
        let users: Vec<String> = members.iter().map(|s| s.to_string()).collect();
        fixture
            .matches
            .create_group_match(&users, None, members[0])
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_invite_and_accept_grows_group() {
        let f = fixture(&["a", "b", "c", "d"]).await;
        let group = group_of(&f, &["a", "b", "c"]).await;

        let invitation = f.invitations.invite(&group.id, "a", "d").await.unwrap();
        assert_eq!(invitation.status, InvitationStatus::Pending);

        let grown = f.invitations.accept(&invitation.id, "d").await.unwrap();
        assert_eq!(grown.member_count, 4);
        assert!(grown.has_member("d"));
    }

    #[tokio::test]
    async fn test_only_members_may_invite() {
        let f = fixture(&["a", "b", "c", "d", "e"]).await;
        let group = group_of(&f, &["a", "b", "c"]).await;

        let err = f.invitations.invite(&group.id, "d", "e").await.unwrap_err();
        assert!(matches!(err, EngineError::NotGroupMember));
    }

    #[tokio::test]
    async fn test_duplicate_pending_invitation_rejected() {
        let f = fixture(&["a", "b", "c", "d"]).await;
        let group = group_of(&f, &["a", "b", "c"]).await;

        f.invitations.invite(&group.id, "a", "d").await.unwrap();
        let err = f.invitations.invite(&group.id, "b", "d").await.unwrap_err();
        assert!(matches!(err, EngineError::DuplicateInvitation));
    }

    #[tokio::test]
    async fn test_accept_is_single_shot() {
        let f = fixture(&["a", "b", "c", "d"]).await;
        let group = group_of(&f, &["a", "b", "c"]).await;
        let invitation = f.invitations.invite(&group.id, "a", "d").await.unwrap();

        f.invitations.accept(&invitation.id, "d").await.unwrap();
        let err = f.invitations.accept(&invitation.id, "d").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_only_invitee_may_act() {
        let f = fixture(&["a", "b", "c", "d"]).await;
        let group = group_of(&f, &["a", "b", "c"]).await;
        let invitation = f.invitations.invite(&group.id, "a", "d").await.unwrap();

        let err = f.invitations.accept(&invitation.id, "b").await.unwrap_err();
        assert!(matches!(err, EngineError::NotInvitee));
        let err = f.invitations.decline(&invitation.id, "b").await.unwrap_err();
        assert!(matches!(err, EngineError::NotInvitee));
    }

    #[tokio::test]
    async fn test_expired_invitation_cannot_be_accepted() {
        let f = fixture(&["a", "b", "c", "d"]).await;
        let group = group_of(&f, &["a", "b", "c"]).await;

        // Insert an already-expired invitation directly
        let now = Utc::now();
        let invitation = GroupInvitation {
            id: "inv-old".to_string(),
            group_id: group.id.clone(),
            inviter_id: "a".to_string(),
            invitee_id: "d".to_string(),
            status: InvitationStatus::Pending,
            created_at: now - Duration::days(8),
            expires_at: now - Duration::days(1),
        };
        f.store.insert_invitation(invitation).await.unwrap();

        let err = f.invitations.accept("inv-old", "d").await.unwrap_err();
        assert!(matches!(err, EngineError::InvitationExpired));

        // Expired pending invitations do not block a fresh invite
        f.invitations.invite(&group.id, "a", "d").await.unwrap();

        // And are filtered from the user's open list
        let open = f.invitations.invitations_for_user("d").await.unwrap();
        assert_eq!(open.len(), 1);
        assert_ne!(open[0].id, "inv-old");
    }

    #[tokio::test]
    async fn test_decline_leaves_membership_untouched() {
        let f = fixture(&["a", "b", "c", "d"]).await;
        let group = group_of(&f, &["a", "b", "c"]).await;
        let invitation = f.invitations.invite(&group.id, "a", "d").await.unwrap();

        let declined = f.invitations.decline(&invitation.id, "d").await.unwrap();
        assert_eq!(declined.status, InvitationStatus::Declined);

        let group = f.store.get_match(&group.id).await.unwrap().unwrap();
        assert_eq!(group.member_count, 3);
        assert!(!group.has_member("d"));
    }

    #[tokio::test]
    async fn test_full_group_cannot_invite() {
        let f = fixture(&["a", "b", "c", "d", "e", "f"]).await;
        let group = group_of(&f, &["a", "b", "c", "d", "e"]).await;

        let err = f.invitations.invite(&group.id, "a", "f").await.unwrap_err();
        assert!(matches!(err, EngineError::GroupFull));
    }
}
