use std::sync::Arc;

use chrono::Utc;

use crate::core::error::EngineError;
use crate::core::matches::MatchManager;
use crate::models::{Match, Swipe, SwipeAction};
use crate::services::{EngineStore, ProfileDirectory};

/// Result of recording a swipe. `matched` is set when the swipe
/// completed a mutual like.
#[derive(Debug, Clone)]
pub struct SwipeOutcome {
    pub swipe: Swipe,
    pub matched: Option<Match>,
}

/// Records directional like/pass/superlike actions and detects mutual
/// likes.
///
/// Swipes are last-write-wins per ordered pair; a pass never creates a
/// match and never retroactively destroys one. Match creation itself is
/// the critical section and lives in the match manager, keyed on the
/// normalized pair, so concurrent swipes from both sides converge on a
/// single match.
pub struct SwipeLedger {
    store: Arc<dyn EngineStore>,
    directory: Arc<dyn ProfileDirectory>,
    matches: Arc<MatchManager>,
}

impl SwipeLedger {
    pub fn new(
        store: Arc<dyn EngineStore>,
        directory: Arc<dyn ProfileDirectory>,
        matches: Arc<MatchManager>,
    ) -> Self {
        Self {
            store,
            directory,
            matches,
        }
    }

    pub async fn record_swipe(
        &self,
        swiper_id: &str,
        target_id: &str,
        action: SwipeAction,
    ) -> Result<SwipeOutcome, EngineError> {
        if swiper_id == target_id {
            return Err(EngineError::InvalidSwipe(
                "cannot swipe on yourself".to_string(),
            ));
        }

        let swiper = self
            .directory
            .get_user(swiper_id)
            .await?
            .ok_or_else(|| EngineError::InvalidSwipe(format!("unknown user {}", swiper_id)))?;
        if swiper.is_banned {
            return Err(EngineError::InvalidSwipe("swiper is banned".to_string()));
        }

        let target = self
            .directory
            .get_user(target_id)
            .await?
            .ok_or_else(|| EngineError::InvalidSwipe(format!("unknown user {}", target_id)))?;
        if target.is_banned {
            return Err(EngineError::InvalidSwipe("target is banned".to_string()));
        }
        if target.paused {
            return Err(EngineError::InvalidSwipe(
                "target has paused discovery".to_string(),
            ));
        }

        let swipe = Swipe {
            swiper_id: swiper_id.to_string(),
            target_id: target_id.to_string(),
            action,
            created_at: Utc::now(),
        };
        self.store.upsert_swipe(swipe.clone()).await?;
        tracing::debug!(
            "Recorded swipe {} -> {} ({})",
            swiper_id,
            target_id,
            action.as_str()
        );

        if !action.is_positive() {
            return Ok(SwipeOutcome {
                swipe,
                matched: None,
            });
        }

        let reverse = self.store.get_swipe(target_id, swiper_id).await?;
        let mutual = reverse.map(|s| s.action.is_positive()).unwrap_or(false);
        if !mutual {
            return Ok(SwipeOutcome {
                swipe,
                matched: None,
            });
        }

        tracing::info!("Mutual like between {} and {}", swiper_id, target_id);
        let matched = self.matches.create_match(swiper_id, target_id).await?;

        Ok(SwipeOutcome {
            swipe,
            matched: Some(matched),
        })
    }
}
