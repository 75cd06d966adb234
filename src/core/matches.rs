use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::core::error::EngineError;
use crate::core::scoring::{average_compatibility, compatibility_score};
use crate::models::{
    DomainEvent, Match, PairKey, ProfileBundle, ScoringWeights, UserRecord, MAX_GROUP_SIZE,
    MIN_GROUP_SIZE,
};
use crate::services::{EngineStore, EventBus, KeyedMutex, ProfileDirectory};

/// Owns Match and GroupMatch lifecycle.
///
/// Creation from mutual likes serializes on the normalized pair key;
/// every other mutation serializes on the match id. Membership only ever
/// grows, and all growth funnels through [`MatchManager::append_member`]
/// so the 2-5 distinct-members invariant holds everywhere.
pub struct MatchManager {
    store: Arc<dyn EngineStore>,
    directory: Arc<dyn ProfileDirectory>,
    weights: ScoringWeights,
    score_cache: moka::future::Cache<String, f64>,
    pair_locks: KeyedMutex,
    entity_locks: KeyedMutex,
    events: EventBus,
}

impl MatchManager {
    pub fn new(
        store: Arc<dyn EngineStore>,
        directory: Arc<dyn ProfileDirectory>,
        weights: ScoringWeights,
        score_cache_size: u64,
        score_ttl_secs: u64,
        events: EventBus,
    ) -> Self {
        let score_cache = moka::future::CacheBuilder::new(score_cache_size)
            .time_to_live(Duration::from_secs(score_ttl_secs))
            .build();

        Self {
            store,
            directory,
            weights,
            score_cache,
            pair_locks: KeyedMutex::new(),
            entity_locks: KeyedMutex::new(),
            events,
        }
    }

    /// Create (or return) the pairwise match for two users.
    ///
    /// Idempotent: an existing match for the pair, blocked or not, is
    /// returned as-is. The pair key is the critical section, so a
    /// mutual-like race can never produce two matches.
    pub async fn create_match(&self, user_a: &str, user_b: &str) -> Result<Match, EngineError> {
        if user_a == user_b {
            return Err(EngineError::InvalidState(
                "a match needs two distinct users".to_string(),
            ));
        }

        let key = PairKey::new(user_a, user_b);
        let _guard = self.pair_locks.lock(&key.to_string()).await;

        if let Some(existing) = self.store.find_pair_match(&key).await? {
            return Ok(existing);
        }

        let id = Uuid::new_v4().to_string();
        let m = Match {
            id: id.clone(),
            users: vec![user_a.to_string(), user_b.to_string()],
            created_at: Utc::now(),
            blocked: false,
            group_name: None,
            average_compatibility: None,
            member_count: 2,
            created_by: None,
            invite_code: None,
        };

        let stored = self.store.insert_match(m).await?;
        if stored.id == id {
            tracing::info!("Created match {} for pair {}", stored.id, key);
            self.events.publish(DomainEvent::MatchCreated {
                match_id: stored.id.clone(),
                users: stored.users.clone(),
            });
        }

        Ok(stored)
    }

    /// Create a group match explicitly (3-5 distinct members).
    pub async fn create_group_match(
        &self,
        users: &[String],
        group_name: Option<String>,
        created_by: &str,
    ) -> Result<Match, EngineError> {
        let distinct: HashSet<&String> = users.iter().collect();
        if distinct.len() != users.len() {
            return Err(EngineError::InvalidGroupSize(
                "member list contains duplicates".to_string(),
            ));
        }
        if users.len() < MIN_GROUP_SIZE || users.len() > MAX_GROUP_SIZE {
            return Err(EngineError::InvalidGroupSize(format!(
                "groups have {} to {} members, got {}",
                MIN_GROUP_SIZE,
                MAX_GROUP_SIZE,
                users.len()
            )));
        }
        if !users.iter().any(|u| u == created_by) {
            return Err(EngineError::NotGroupMember);
        }
        for user_id in users {
            self.require_eligible(user_id).await?;
        }

        if let Some(existing) = self.find_group_with_members(users).await? {
            tracing::debug!("Group with identical members exists: {}", existing.id);
            return Err(EngineError::DuplicateMatch);
        }

        let average = self.pairwise_average(users).await?;
        let m = Match {
            id: Uuid::new_v4().to_string(),
            users: users.to_vec(),
            created_at: Utc::now(),
            blocked: false,
            group_name,
            average_compatibility: average,
            member_count: users.len(),
            created_by: Some(created_by.to_string()),
            invite_code: Some(generate_invite_code()),
        };

        let stored = self.store.insert_match(m).await?;
        tracing::info!(
            "Created group match {} with {} members",
            stored.id,
            stored.member_count
        );
        self.events.publish(DomainEvent::GroupMatchCreated {
            match_id: stored.id.clone(),
            users: stored.users.clone(),
            created_by: created_by.to_string(),
        });

        Ok(stored)
    }

    /// Grow a match by one member and recompute its average
    /// compatibility. The only membership mutation in the engine.
    pub async fn append_member(&self, match_id: &str, user_id: &str) -> Result<Match, EngineError> {
        let _guard = self.entity_locks.lock(match_id).await;

        let mut m = self
            .store
            .get_match(match_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("match {}", match_id)))?;

        if m.blocked {
            return Err(EngineError::InvalidState("match is blocked".to_string()));
        }
        if m.users.len() >= MAX_GROUP_SIZE {
            return Err(EngineError::GroupFull);
        }
        if m.has_member(user_id) {
            return Err(EngineError::AlreadyMember);
        }
        self.require_eligible(user_id).await?;

        m.users.push(user_id.to_string());
        m.member_count = m.users.len();
        m.average_compatibility = self.pairwise_average(&m.users).await?;

        self.store.update_match(&m).await?;
        tracing::info!("User {} joined match {}", user_id, match_id);
        self.events.publish(DomainEvent::MemberJoined {
            match_id: match_id.to_string(),
            user_id: user_id.to_string(),
        });

        Ok(m)
    }

    pub async fn block_match(&self, match_id: &str) -> Result<Match, EngineError> {
        self.set_blocked(match_id, true).await
    }

    pub async fn unblock_match(&self, match_id: &str) -> Result<Match, EngineError> {
        self.set_blocked(match_id, false).await
    }

    /// All matches containing the user, newest first.
    pub async fn matches_for_user(&self, user_id: &str) -> Result<Vec<Match>, EngineError> {
        Ok(self.store.matches_for_user(user_id).await?)
    }

    /// The question the messaging service asks before opening a chat
    /// channel: do these users share a non-blocked match?
    pub async fn can_interact(&self, user_a: &str, user_b: &str) -> Result<bool, EngineError> {
        let matches = self.store.matches_for_user(user_a).await?;
        Ok(matches.iter().any(|m| !m.blocked && m.has_member(user_b)))
    }

    async fn set_blocked(&self, match_id: &str, blocked: bool) -> Result<Match, EngineError> {
        let _guard = self.entity_locks.lock(match_id).await;

        let mut m = self
            .store
            .get_match(match_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("match {}", match_id)))?;

        m.blocked = blocked;
        self.store.update_match(&m).await?;
        tracing::info!("Match {} blocked={}", match_id, blocked);

        Ok(m)
    }

    async fn require_eligible(&self, user_id: &str) -> Result<UserRecord, EngineError> {
        let user = self
            .directory
            .get_user(user_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("user {}", user_id)))?;
        if user.is_banned {
            return Err(EngineError::InvalidState(format!(
                "user {} is banned",
                user_id
            )));
        }
        Ok(user)
    }

    async fn find_group_with_members(
        &self,
        users: &[String],
    ) -> Result<Option<Match>, EngineError> {
        let mut wanted: Vec<&String> = users.iter().collect();
        wanted.sort();

        let candidates = self.store.matches_for_user(&users[0]).await?;
        Ok(candidates.into_iter().find(|m| {
            if m.blocked || m.users.len() != users.len() {
                return false;
            }
            let mut members: Vec<&String> = m.users.iter().collect();
            members.sort();
            members == wanted
        }))
    }

    /// Mean of pairwise scores over all member pairs, through the score
    /// cache. `None` below two members.
    async fn pairwise_average(&self, users: &[String]) -> Result<Option<f64>, EngineError> {
        let mut bundles = Vec::with_capacity(users.len());
        for user_id in users {
            bundles.push(self.directory.get_bundle(user_id).await?);
        }

        let mut scores = Vec::new();
        for i in 0..bundles.len() {
            for j in (i + 1)..bundles.len() {
                scores.push(self.pair_score(&bundles[i], &bundles[j]).await);
            }
        }

        Ok(average_compatibility(&scores))
    }

    async fn pair_score(&self, a: &ProfileBundle, b: &ProfileBundle) -> f64 {
        let key = PairKey::new(&a.user_id, &b.user_id).to_string();
        if let Some(score) = self.score_cache.get(&key).await {
            return score;
        }
        let score = compatibility_score(a, b, &self.weights).score;
        self.score_cache.insert(key, score).await;
        score
    }
}

fn generate_invite_code() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{MemoryStore, StaticDirectory};

    async fn seeded_manager(user_ids: &[&str]) -> MatchManager {
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
        MatchManager::new(store, directory, ScoringWeights::default(), 1000, 300, events)
    }

    #[tokio::test]
    async fn test_create_match_is_idempotent() {
        let manager = seeded_manager(&["alice", "bob"]).await;

        let first = manager.create_match("alice", "bob").await.unwrap();
        let second = manager.create_match("bob", "alice").await.unwrap();

        assert_eq!(first.id, second.id);
        assert!(!first.blocked);
        assert_eq!(manager.matches_for_user("alice").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_group_size_validation() {
        let manager = seeded_manager(&["a", "b", "c", "d", "e", "f"]).await;

        let too_small = vec!["a".to_string(), "b".to_string()];
        let err = manager
            .create_group_match(&too_small, None, "a")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidGroupSize(_)));

        let duplicates = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        let err = manager
            .create_group_match(&duplicates, None, "a")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidGroupSize(_)));

        let six: Vec<String> = ["a", "b", "c", "d", "e", "f"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let err = manager.create_group_match(&six, None, "a").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidGroupSize(_)));
    }

    #[tokio::test]
    async fn test_creator_must_be_member() {
        let manager = seeded_manager(&["a", "b", "c", "d"]).await;
        let users: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();

        let err = manager
            .create_group_match(&users, None, "d")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotGroupMember));
    }

    #[tokio::test]
    async fn test_append_member_enforces_capacity() {
        let manager = seeded_manager(&["a", "b", "c", "d", "e", "f"]).await;
        let users: Vec<String> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let group = manager
            .create_group_match(&users, Some("flat hunt".to_string()), "a")
            .await
            .unwrap();

        let err = manager.append_member(&group.id, "f").await.unwrap_err();
        assert!(matches!(err, EngineError::GroupFull));

        let err = manager.append_member(&group.id, "a").await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadyMember));
    }

    #[tokio::test]
    async fn test_block_gates_interaction() {
        let manager = seeded_manager(&["alice", "bob"]).await;
        let m = manager.create_match("alice", "bob").await.unwrap();

        assert!(manager.can_interact("alice", "bob").await.unwrap());
        manager.block_match(&m.id).await.unwrap();
        assert!(!manager.can_interact("alice", "bob").await.unwrap());
        manager.unblock_match(&m.id).await.unwrap();
        assert!(manager.can_interact("alice", "bob").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_group_rejected() {
        let manager = seeded_manager(&["a", "b", "c"]).await;
        let users: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();

        manager.create_group_match(&users, None, "a").await.unwrap();
        let reordered: Vec<String> = ["c", "a", "b"].iter().map(|s| s.to_string()).collect();
        let err = manager
            .create_group_match(&reordered, None, "b")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateMatch));
    }
}
