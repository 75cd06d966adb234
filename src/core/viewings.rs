use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::core::error::EngineError;
use crate::models::{
    Availability, DomainEvent, ProposalStatus, ProposedTime, ViewingProposal, ViewingResponse,
};
use crate::services::{EngineStore, EventBus, KeyedMutex};

/// Multi-party scheduling protocol for room viewings.
///
/// One member proposes candidate times, every match member responds,
/// and evaluation confirms once all members are in and a strict
/// majority of index votes agrees on a slot. Terminal states are final;
/// renegotiation means a new proposal.
pub struct ViewingEngine {
    store: Arc<dyn EngineStore>,
    locks: KeyedMutex,
    events: EventBus,
}

impl ViewingEngine {
    pub fn new(store: Arc<dyn EngineStore>, events: EventBus) -> Self {
        Self {
            store,
            locks: KeyedMutex::new(),
            events,
        }
    }

    pub async fn create_proposal(
        &self,
        match_id: &str,
        proposed_by: &str,
        proposed_times: Vec<ProposedTime>,
    ) -> Result<ViewingProposal, EngineError> {
        if proposed_times.is_empty() {
            return Err(EngineError::EmptyProposal);
        }

        let m = self
            .store
            .get_match(match_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("match {}", match_id)))?;
        if !m.has_member(proposed_by) {
            return Err(EngineError::NotMatchMember);
        }
        if m.blocked {
            return Err(EngineError::InvalidState("match is blocked".to_string()));
        }

        let proposal = ViewingProposal {
            id: Uuid::new_v4().to_string(),
            match_id: match_id.to_string(),
            proposed_by: proposed_by.to_string(),
            proposed_times,
            responses: Vec::new(),
            status: ProposalStatus::Pending,
            created_at: Utc::now(),
        };
        self.store.insert_proposal(proposal.clone()).await?;

        tracing::info!(
            "User {} proposed {} viewing times for match {}",
            proposed_by,
            proposal.proposed_times.len(),
            match_id
        );

        Ok(proposal)
    }

    /// Record or replace a member's response.
    pub async fn respond(
        &self,
        proposal_id: &str,
        user_id: &str,
        response: Availability,
        selected_time_index: Option<usize>,
        notes: Option<String>,
    ) -> Result<ViewingProposal, EngineError> {
        let _guard = self.locks.lock(proposal_id).await;

        let mut proposal = self.load(proposal_id).await?;
        let m = self
            .store
            .get_match(&proposal.match_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("match {}", proposal.match_id)))?;

        if !m.has_member(user_id) {
            return Err(EngineError::NotMatchMember);
        }
        if proposal.status.is_terminal() {
            return Err(EngineError::InvalidState(format!(
                "proposal is {}",
                proposal.status.as_str()
            )));
        }
        if let Some(index) = selected_time_index {
            if index >= proposal.proposed_times.len() {
                return Err(EngineError::InvalidTimeIndex {
                    index,
                    len: proposal.proposed_times.len(),
                });
            }
        }

        proposal.upsert_response(ViewingResponse {
            user_id: user_id.to_string(),
            response,
            selected_time_index,
            notes,
        });
        self.store.update_proposal(&proposal).await?;

        Ok(proposal)
    }

    /// Apply the confirmation rule. Idempotent: a proposal in a terminal
    /// state comes back unchanged. A negative response never
    /// auto-cancels; an unconfirmable proposal simply stays pending for
    /// renegotiation.
    pub async fn evaluate(&self, proposal_id: &str) -> Result<ViewingProposal, EngineError> {
        let _guard = self.locks.lock(proposal_id).await;

        let mut proposal = self.load(proposal_id).await?;
        if proposal.status.is_terminal() {
            return Ok(proposal);
        }

        let m = self
            .store
            .get_match(&proposal.match_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("match {}", proposal.match_id)))?;

        let Some(winner) = confirmation_winner(&proposal, &m.users) else {
            return Ok(proposal);
        };

        let time = proposal.proposed_times[winner].clone();
        proposal.proposed_times = vec![time.clone()];
        // Re-anchor index votes onto the sole surviving slot
        for response in &mut proposal.responses {
            response.selected_time_index = if response.selected_time_index == Some(winner) {
                Some(0)
            } else {
                None
            };
        }
        proposal.status = ProposalStatus::Confirmed;
        self.store.update_proposal(&proposal).await?;

        tracing::info!("Proposal {} confirmed for {}", proposal.id, time.datetime);
        self.events.publish(DomainEvent::ProposalConfirmed {
            proposal_id: proposal.id.clone(),
            match_id: proposal.match_id.clone(),
            time,
        });

        Ok(proposal)
    }

    /// Any match member may cancel a pending proposal. Cancellation is
    /// always explicit; nothing times out on its own.
    pub async fn cancel(
        &self,
        proposal_id: &str,
        acting_user_id: &str,
    ) -> Result<ViewingProposal, EngineError> {
        let _guard = self.locks.lock(proposal_id).await;

        let mut proposal = self.load(proposal_id).await?;
        let m = self
            .store
            .get_match(&proposal.match_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("match {}", proposal.match_id)))?;

        if !m.has_member(acting_user_id) {
            return Err(EngineError::NotMatchMember);
        }
        if proposal.status.is_terminal() {
            return Err(EngineError::InvalidState(format!(
                "proposal is {}",
                proposal.status.as_str()
            )));
        }

        proposal.status = ProposalStatus::Cancelled;
        self.store.update_proposal(&proposal).await?;

        tracing::info!("Proposal {} cancelled by {}", proposal_id, acting_user_id);

        Ok(proposal)
    }

    /// All proposals for a match, newest first.
    pub async fn proposals_for_match(
        &self,
        match_id: &str,
    ) -> Result<Vec<ViewingProposal>, EngineError> {
        Ok(self.store.proposals_for_match(match_id).await?)
    }

    async fn load(&self, proposal_id: &str) -> Result<ViewingProposal, EngineError> {
        self.store
            .get_proposal(proposal_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("proposal {}", proposal_id)))
    }
}

/// The confirmation rule.
///
/// Confirms when every current match member has responded available or
/// maybe, and one time index holds a strict majority among the
/// responses that selected an index. Returns the winning index,
/// earliest first on the (theoretical) tie.
fn confirmation_winner(proposal: &ViewingProposal, members: &[String]) -> Option<usize> {
    for member in members {
        match proposal.response_for(member) {
            Some(r) if r.response != Availability::Unavailable => {}
            _ => return None,
        }
    }

    let votes: Vec<usize> = members
        .iter()
        .filter_map(|member| {
            proposal
                .response_for(member)
                .and_then(|r| r.selected_time_index)
        })
        .collect();
    if votes.is_empty() {
        return None;
    }

    let mut tally = vec![0usize; proposal.proposed_times.len()];
    for vote in &votes {
        tally[*vote] += 1;
    }

    tally
        .iter()
        .enumerate()
        .find(|(_, &count)| count * 2 > votes.len())
        .map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal_with(times: usize, responses: Vec<(&str, Availability, Option<usize>)>) -> ViewingProposal {
        ViewingProposal {
            id: "p1".to_string(),
            match_id: "m1".to_string(),
            proposed_by: "a".to_string(),
            proposed_times: (0..times)
                .map(|i| ProposedTime {
                    datetime: Utc::now() + chrono::Duration::days(i as i64 + 1),
                    location: None,
                    notes: None,
                })
                .collect(),
            responses: responses
                .into_iter()
                .map(|(user, response, index)| ViewingResponse {
                    user_id: user.to_string(),
                    response,
                    selected_time_index: index,
                    notes: None,
                })
                .collect(),
            status: ProposalStatus::Pending,
            created_at: Utc::now(),
        }
    }

    fn members(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_majority_confirms() {
        let proposal = proposal_with(
            2,
            vec![
                ("a", Availability::Available, Some(0)),
                ("b", Availability::Available, Some(0)),
                ("c", Availability::Maybe, Some(1)),
            ],
        );
        assert_eq!(confirmation_winner(&proposal, &members(&["a", "b", "c"])), Some(0));
    }

    #[test]
    fn test_missing_member_blocks_confirmation() {
        let proposal = proposal_with(
            2,
            vec![
                ("a", Availability::Available, Some(0)),
                ("b", Availability::Available, Some(0)),
            ],
        );
        assert_eq!(confirmation_winner(&proposal, &members(&["a", "b", "c"])), None);
    }

    #[test]
    fn test_unavailable_member_blocks_confirmation() {
        let proposal = proposal_with(
            2,
            vec![
                ("a", Availability::Available, Some(0)),
                ("b", Availability::Available, Some(0)),
                ("c", Availability::Unavailable, None),
            ],
        );
        assert_eq!(confirmation_winner(&proposal, &members(&["a", "b", "c"])), None);
    }

    #[test]
    fn test_split_vote_stays_pending() {
        let proposal = proposal_with(
            2,
            vec![
                ("a", Availability::Available, Some(0)),
                ("b", Availability::Available, Some(1)),
            ],
        );
        assert_eq!(confirmation_winner(&proposal, &members(&["a", "b"])), None);
    }

    #[test]
    fn test_maybe_without_index_still_confirms_others() {
        // Two of two index votes agree; the maybe abstains from voting
        let proposal = proposal_with(
            3,
            vec![
                ("a", Availability::Available, Some(2)),
                ("b", Availability::Available, Some(2)),
                ("c", Availability::Maybe, None),
            ],
        );
        assert_eq!(confirmation_winner(&proposal, &members(&["a", "b", "c"])), Some(2));
    }
}
