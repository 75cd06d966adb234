use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;

use crate::models::{GroupInvitation, Match, PairKey, Swipe, ViewingProposal};
use crate::services::store::{EngineStore, StoreError};

/// PostgreSQL-backed engine store.
///
/// Durable storage for multi-instance deployments. The unique index on
/// `matches.pair_key` is the cross-process backstop for mutual-match
/// creation: a lost race surfaces as a conflict and the existing row is
/// returned instead of a duplicate.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new store from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Create a new store from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
    ) -> Result<Self, StoreError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
        )
        .await
    }
}

fn row_to_swipe(row: &PgRow) -> Result<Swipe, StoreError> {
    let action: String = row.try_get("action")?;
    Ok(Swipe {
        swiper_id: row.try_get("swiper_id")?,
        target_id: row.try_get("target_id")?,
        action: action.parse().map_err(StoreError::Corrupt)?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_match(row: &PgRow) -> Result<Match, StoreError> {
    let users_json: serde_json::Value = row.try_get("users")?;
    let users: Vec<String> = serde_json::from_value(users_json)?;
    let member_count = users.len();
    Ok(Match {
        id: row.try_get("id")?,
        users,
        created_at: row.try_get("created_at")?,
        blocked: row.try_get("blocked")?,
        group_name: row.try_get("group_name")?,
        average_compatibility: row.try_get("average_compatibility")?,
        member_count,
        created_by: row.try_get("created_by")?,
        invite_code: row.try_get("invite_code")?,
    })
}

fn row_to_invitation(row: &PgRow) -> Result<GroupInvitation, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(GroupInvitation {
        id: row.try_get("id")?,
        group_id: row.try_get("group_id")?,
        inviter_id: row.try_get("inviter_id")?,
        invitee_id: row.try_get("invitee_id")?,
        status: status.parse().map_err(StoreError::Corrupt)?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

fn row_to_proposal(row: &PgRow) -> Result<ViewingProposal, StoreError> {
    let status: String = row.try_get("status")?;
    let times_json: serde_json::Value = row.try_get("proposed_times")?;
    let responses_json: serde_json::Value = row.try_get("responses")?;
    Ok(ViewingProposal {
        id: row.try_get("id")?,
        match_id: row.try_get("match_id")?,
        proposed_by: row.try_get("proposed_by")?,
        proposed_times: serde_json::from_value(times_json)?,
        responses: serde_json::from_value(responses_json)?,
        status: status.parse().map_err(StoreError::Corrupt)?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl EngineStore for PostgresStore {
    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    async fn upsert_swipe(&self, swipe: Swipe) -> Result<(), StoreError> {
        let query = r#"
            INSERT INTO swipes (swiper_id, target_id, action, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (swiper_id, target_id)
            DO UPDATE SET
                action = EXCLUDED.action,
                created_at = EXCLUDED.created_at
        "#;

        sqlx::query(query)
            .bind(&swipe.swiper_id)
            .bind(&swipe.target_id)
            .bind(swipe.action.as_str())
            .bind(swipe.created_at)
            .execute(&self.pool)
            .await?;

        tracing::debug!(
            "Recorded swipe: {} -> {} ({})",
            swipe.swiper_id,
            swipe.target_id,
            swipe.action.as_str()
        );

        Ok(())
    }

    async fn get_swipe(
        &self,
        swiper_id: &str,
        target_id: &str,
    ) -> Result<Option<Swipe>, StoreError> {
        let query = r#"
            SELECT swiper_id, target_id, action, created_at
            FROM swipes
            WHERE swiper_id = $1 AND target_id = $2
        "#;

        let row = sqlx::query(query)
            .bind(swiper_id)
            .bind(target_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_swipe).transpose()
    }

    async fn insert_match(&self, m: Match) -> Result<Match, StoreError> {
        let pair_key = m.pair_key().map(|k| k.to_string());
        let users = serde_json::to_value(&m.users)?;

        let query = r#"
            INSERT INTO matches
                (id, users, pair_key, created_at, blocked, group_name,
                 average_compatibility, created_by, invite_code)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (pair_key) DO NOTHING
        "#;

        let result = sqlx::query(query)
            .bind(&m.id)
            .bind(&users)
            .bind(&pair_key)
            .bind(m.created_at)
            .bind(m.blocked)
            .bind(&m.group_name)
            .bind(m.average_compatibility)
            .bind(&m.created_by)
            .bind(&m.invite_code)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            // Lost the pair-key race; hand back the row that won it
            if let Some(users_pair) = m.pair_key() {
                if let Some(existing) = self.find_pair_match(&users_pair).await? {
                    return Ok(existing);
                }
            }
            return Err(StoreError::Unavailable(format!(
                "match insert conflict for {}",
                m.id
            )));
        }

        Ok(m)
    }

    async fn update_match(&self, m: &Match) -> Result<(), StoreError> {
        let pair_key = m.pair_key().map(|k| k.to_string());
        let users = serde_json::to_value(&m.users)?;

        let query = r#"
            UPDATE matches
            SET users = $2,
                pair_key = $3,
                blocked = $4,
                group_name = $5,
                average_compatibility = $6,
                created_by = $7,
                invite_code = $8
            WHERE id = $1
        "#;

        sqlx::query(query)
            .bind(&m.id)
            .bind(&users)
            .bind(&pair_key)
            .bind(m.blocked)
            .bind(&m.group_name)
            .bind(m.average_compatibility)
            .bind(&m.created_by)
            .bind(&m.invite_code)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_match(&self, id: &str) -> Result<Option<Match>, StoreError> {
        let query = r#"
            SELECT id, users, created_at, blocked, group_name,
                   average_compatibility, created_by, invite_code
            FROM matches
            WHERE id = $1
        "#;

        let row = sqlx::query(query).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_match).transpose()
    }

    async fn find_pair_match(&self, key: &PairKey) -> Result<Option<Match>, StoreError> {
        let query = r#"
            SELECT id, users, created_at, blocked, group_name,
                   average_compatibility, created_by, invite_code
            FROM matches
            WHERE pair_key = $1
        "#;

        let row = sqlx::query(query)
            .bind(key.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_match).transpose()
    }

    async fn matches_for_user(&self, user_id: &str) -> Result<Vec<Match>, StoreError> {
        let query = r#"
            SELECT id, users, created_at, blocked, group_name,
                   average_compatibility, created_by, invite_code
            FROM matches
            WHERE users @> $1
            ORDER BY created_at DESC
        "#;

        let membership = serde_json::json!([user_id]);
        let rows = sqlx::query(query)
            .bind(membership)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_match).collect()
    }

    async fn insert_invitation(&self, invitation: GroupInvitation) -> Result<(), StoreError> {
        let query = r#"
            INSERT INTO group_invitations
                (id, group_id, inviter_id, invitee_id, status, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#;

        sqlx::query(query)
            .bind(&invitation.id)
            .bind(&invitation.group_id)
            .bind(&invitation.inviter_id)
            .bind(&invitation.invitee_id)
            .bind(invitation.status.as_str())
            .bind(invitation.created_at)
            .bind(invitation.expires_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update_invitation(&self, invitation: &GroupInvitation) -> Result<(), StoreError> {
        let query = r#"
            UPDATE group_invitations
            SET status = $2
            WHERE id = $1
        "#;

        sqlx::query(query)
            .bind(&invitation.id)
            .bind(invitation.status.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_invitation(&self, id: &str) -> Result<Option<GroupInvitation>, StoreError> {
        let query = r#"
            SELECT id, group_id, inviter_id, invitee_id, status, created_at, expires_at
            FROM group_invitations
            WHERE id = $1
        "#;

        let row = sqlx::query(query).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_invitation).transpose()
    }

    async fn pending_invitations_for_group(
        &self,
        group_id: &str,
    ) -> Result<Vec<GroupInvitation>, StoreError> {
        let query = r#"
            SELECT id, group_id, inviter_id, invitee_id, status, created_at, expires_at
            FROM group_invitations
            WHERE group_id = $1 AND status = 'pending'
        "#;

        let rows = sqlx::query(query)
            .bind(group_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_invitation).collect()
    }

    async fn invitations_for_invitee(
        &self,
        invitee_id: &str,
    ) -> Result<Vec<GroupInvitation>, StoreError> {
        let query = r#"
            SELECT id, group_id, inviter_id, invitee_id, status, created_at, expires_at
            FROM group_invitations
            WHERE invitee_id = $1
            ORDER BY created_at DESC
        "#;

        let rows = sqlx::query(query)
            .bind(invitee_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_invitation).collect()
    }

    async fn insert_proposal(&self, proposal: ViewingProposal) -> Result<(), StoreError> {
        let query = r#"
            INSERT INTO viewing_proposals
                (id, match_id, proposed_by, proposed_times, responses, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#;

        sqlx::query(query)
            .bind(&proposal.id)
            .bind(&proposal.match_id)
            .bind(&proposal.proposed_by)
            .bind(serde_json::to_value(&proposal.proposed_times)?)
            .bind(serde_json::to_value(&proposal.responses)?)
            .bind(proposal.status.as_str())
            .bind(proposal.created_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update_proposal(&self, proposal: &ViewingProposal) -> Result<(), StoreError> {
        let query = r#"
            UPDATE viewing_proposals
            SET proposed_times = $2,
                responses = $3,
                status = $4
            WHERE id = $1
        "#;

        sqlx::query(query)
            .bind(&proposal.id)
            .bind(serde_json::to_value(&proposal.proposed_times)?)
            .bind(serde_json::to_value(&proposal.responses)?)
            .bind(proposal.status.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_proposal(&self, id: &str) -> Result<Option<ViewingProposal>, StoreError> {
        let query = r#"
            SELECT id, match_id, proposed_by, proposed_times, responses, status, created_at
            FROM viewing_proposals
            WHERE id = $1
        "#;

        let row = sqlx::query(query).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_proposal).transpose()
    }

    async fn proposals_for_match(
        &self,
        match_id: &str,
    ) -> Result<Vec<ViewingProposal>, StoreError> {
        let query = r#"
            SELECT id, match_id, proposed_by, proposed_times, responses, status, created_at
            FROM viewing_proposals
            WHERE match_id = $1
            ORDER BY created_at DESC
        "#;

        let rows = sqlx::query(query)
            .bind(match_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_proposal).collect()
    }
}
