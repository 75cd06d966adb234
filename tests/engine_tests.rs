// Integration tests for the Roomio matching engine

use std::sync::Arc;

use chrono::Utc;
use roomio_engine::core::{
    compatibility_score, EngineError, InvitationManager, MatchManager, SwipeLedger, ViewingEngine,
};
use roomio_engine::models::{
    Availability, DomainEvent, HousingRecord, LifestyleRecord, PreferenceRecord, ProfileBundle,
    ProposedTime, ScoringWeights, SleepSchedule, SwipeAction, UserRecord,
};
use roomio_engine::services::{EngineStore, EventBus, MemoryStore, ProfileDirectory, StaticDirectory};
use tokio::sync::mpsc::UnboundedReceiver;

struct Engine {
    store: Arc<MemoryStore>,
    directory: Arc<StaticDirectory>,
    ledger: SwipeLedger,
    matches: Arc<MatchManager>,
    invitations: InvitationManager,
    viewings: ViewingEngine,
    events: UnboundedReceiver<DomainEvent>,
}

fn bundle_for(user_id: &str, cleanliness: u8, hobbies: &[&str]) -> ProfileBundle {
    ProfileBundle {
        user_id: user_id.to_string(),
        lifestyle: Some(LifestyleRecord {
            cleanliness: Some(cleanliness),
            sleep_schedule: Some(SleepSchedule::Early),
            noise_tolerance: Some(3),
            guest_frequency: Some(2),
            smoking: Some(false),
            pets: Some(false),
        }),
        housing: Some(HousingRecord {
            budget_min: Some(500),
            budget_max: Some(900),
            neighborhoods: vec!["Kreuzberg".to_string()],
        }),
        preferences: Some(PreferenceRecord {
            dietary: vec!["vegetarian".to_string()],
            hobbies: hobbies.iter().map(|s| s.to_string()).collect(),
            languages: vec!["en".to_string()],
        }),
    }
}

async fn engine_with_users(user_ids: &[&str]) -> Engine {
    let store = Arc::new(MemoryStore::new());
    let directory = Arc::new(StaticDirectory::new());

    for (i, user_id) in user_ids.iter().enumerate() {
        directory
            .insert_user(UserRecord {
                user_id: user_id.to_string(),
                city: "Berlin".to_string(),
                university: Some("TU Berlin".to_string()),
                paused: false,
                is_banned: false,
            })
            .await;
        directory
            .insert_bundle(bundle_for(
                user_id,
                1 + (i % 5) as u8,
                &["climbing", "cooking"],
            ))
            .await;
    }

    let (events, event_rx) = EventBus::channel();
    let matches = Arc::new(MatchManager::new(
        store.clone(),
        directory.clone(),
        ScoringWeights::default(),
        1000,
        300,
        events.clone(),
    ));
    let ledger = SwipeLedger::new(store.clone(), directory.clone(), matches.clone());
    let invitations = InvitationManager::new(store.clone(), directory.clone(), matches.clone(), 7);
    let viewings = ViewingEngine::new(store.clone(), events);

    Engine {
        store,
        directory,
        ledger,
        matches,
        invitations,
        viewings,
        events: event_rx,
    }
}

fn times(count: usize) -> Vec<ProposedTime> {
    (0..count)
        .map(|i| ProposedTime {
            datetime: Utc::now() + chrono::Duration::days(i as i64 + 1),
            location: Some("Sonnenallee 12".to_string()),
            notes: None,
        })
        .collect()
}

#[tokio::test]
async fn test_mutual_like_in_either_order_yields_one_match() {
    let mut engine = engine_with_users(&["s1", "s2"]).await;

    let first = engine
        .ledger
        .record_swipe("s1", "s2", SwipeAction::Like)
        .await
        .unwrap();
    assert!(first.matched.is_none());

    let second = engine
        .ledger
        .record_swipe("s2", "s1", SwipeAction::Like)
        .await
        .unwrap();
    let matched = second.matched.expect("second like completes the match");
    assert!(matched.has_member("s1") && matched.has_member("s2"));
    assert!(!matched.blocked);

    assert_eq!(engine.matches.matches_for_user("s1").await.unwrap().len(), 1);
    assert_eq!(engine.matches.matches_for_user("s2").await.unwrap().len(), 1);

    match engine.events.recv().await {
        Some(DomainEvent::MatchCreated { match_id, .. }) => assert_eq!(match_id, matched.id),
        other => panic!("expected MatchCreated, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_mutual_likes_create_exactly_one_match() {
    let engine = Arc::new(engine_with_users(&["racer1", "racer2"]).await);

    for _ in 0..20 {
        let a = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .ledger
                    .record_swipe("racer1", "racer2", SwipeAction::Like)
                    .await
            })
        };
        let b = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .ledger
                    .record_swipe("racer2", "racer1", SwipeAction::Superlike)
                    .await
            })
        };

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let matches = engine.matches.matches_for_user("racer1").await.unwrap();
        assert_eq!(matches.len(), 1, "race must never create a second match");
    }
}

#[tokio::test]
async fn test_pass_never_creates_or_destroys_a_match() {
    let engine = engine_with_users(&["a", "b"]).await;

    engine
        .ledger
        .record_swipe("a", "b", SwipeAction::Like)
        .await
        .unwrap();
    let outcome = engine
        .ledger
        .record_swipe("b", "a", SwipeAction::Pass)
        .await
        .unwrap();
    assert!(outcome.matched.is_none());
    assert!(engine.matches.matches_for_user("a").await.unwrap().is_empty());

    // Now match them, then pass again: the match must survive
    engine
        .ledger
        .record_swipe("b", "a", SwipeAction::Like)
        .await
        .unwrap();
    assert_eq!(engine.matches.matches_for_user("a").await.unwrap().len(), 1);

    engine
        .ledger
        .record_swipe("a", "b", SwipeAction::Pass)
        .await
        .unwrap();
    assert_eq!(
        engine.matches.matches_for_user("a").await.unwrap().len(),
        1,
        "a later pass must not retroactively destroy the match"
    );
}

#[tokio::test]
async fn test_blocked_pair_never_gets_a_second_match() {
    let engine = engine_with_users(&["a", "b"]).await;

    engine
        .ledger
        .record_swipe("a", "b", SwipeAction::Like)
        .await
        .unwrap();
    let matched = engine
        .ledger
        .record_swipe("b", "a", SwipeAction::Like)
        .await
        .unwrap()
        .matched
        .unwrap();

    engine.matches.block_match(&matched.id).await.unwrap();

    // Re-run the whole mutual-like sequence
    engine
        .ledger
        .record_swipe("a", "b", SwipeAction::Like)
        .await
        .unwrap();
    let rerun = engine
        .ledger
        .record_swipe("b", "a", SwipeAction::Like)
        .await
        .unwrap();

    assert_eq!(rerun.matched.unwrap().id, matched.id);
    assert_eq!(engine.matches.matches_for_user("a").await.unwrap().len(), 1);
    assert!(!engine.matches.can_interact("a", "b").await.unwrap());
}

#[tokio::test]
async fn test_swiping_paused_or_banned_users_fails() {
    let engine = engine_with_users(&["a"]).await;
    engine
        .directory
        .insert_user(UserRecord {
            user_id: "sleeper".to_string(),
            city: "Berlin".to_string(),
            university: None,
            paused: true,
            is_banned: false,
        })
        .await;
    engine
        .directory
        .insert_user(UserRecord {
            user_id: "outlaw".to_string(),
            city: "Berlin".to_string(),
            university: None,
            paused: false,
            is_banned: true,
        })
        .await;

    for target in ["sleeper", "outlaw"] {
        let err = engine
            .ledger
            .record_swipe("a", target, SwipeAction::Like)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidSwipe(_)));
    }
}

#[tokio::test]
async fn test_group_average_matches_pairwise_mean_after_growth() {
    let engine = engine_with_users(&["a", "b", "c", "d"]).await;
    let members: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    let group = engine
        .matches
        .create_group_match(&members, Some("WG Sonnenallee".to_string()), "a")
        .await
        .unwrap();
    assert!(group.average_compatibility.is_some());
    assert_eq!(group.member_count, 3);
    assert!(group.invite_code.is_some());

    let invitation = engine.invitations.invite(&group.id, "a", "d").await.unwrap();
    let grown = engine.invitations.accept(&invitation.id, "d").await.unwrap();
    assert_eq!(grown.member_count, 4);

    // Recompute the expected mean over all pairs by hand
    let ids = ["a", "b", "c", "d"];
    let mut bundles = Vec::new();
    for id in ids {
        bundles.push(engine.directory.get_bundle(id).await.unwrap());
    }
    let weights = ScoringWeights::default();
    let mut scores = Vec::new();
    for i in 0..bundles.len() {
        for j in (i + 1)..bundles.len() {
            scores.push(compatibility_score(&bundles[i], &bundles[j], &weights).score);
        }
    }
    let expected = scores.iter().sum::<f64>() / scores.len() as f64;

    let actual = grown.average_compatibility.unwrap();
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}

#[tokio::test]
async fn test_full_group_rejects_sixth_member() {
    let engine = engine_with_users(&["a", "b", "c", "d", "e", "f"]).await;
    let members: Vec<String> = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let group = engine
        .matches
        .create_group_match(&members, None, "a")
        .await
        .unwrap();

    let err = engine.invitations.invite(&group.id, "a", "f").await.unwrap_err();
    assert!(matches!(err, EngineError::GroupFull));
}

#[tokio::test]
async fn test_pair_grown_by_invitation_becomes_group() {
    let engine = engine_with_users(&["a", "b", "c"]).await;

    engine
        .ledger
        .record_swipe("a", "b", SwipeAction::Like)
        .await
        .unwrap();
    let pair = engine
        .ledger
        .record_swipe("b", "a", SwipeAction::Like)
        .await
        .unwrap()
        .matched
        .unwrap();
    assert!(!pair.is_group());

    let invitation = engine.invitations.invite(&pair.id, "a", "c").await.unwrap();
    let grown = engine.invitations.accept(&invitation.id, "c").await.unwrap();

    assert!(grown.is_group());
    assert_eq!(grown.member_count, 3);
    assert!(grown.average_compatibility.is_some());
}

#[tokio::test]
async fn test_majority_vote_confirms_earliest_winning_time() {
    let mut engine = engine_with_users(&["a", "b", "c"]).await;
    let members: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    let group = engine
        .matches
        .create_group_match(&members, None, "a")
        .await
        .unwrap();

    let proposal = engine
        .viewings
        .create_proposal(&group.id, "a", times(2))
        .await
        .unwrap();
    let expected_time = proposal.proposed_times[0].datetime;

    engine
        .viewings
        .respond(&proposal.id, "a", Availability::Available, Some(0), None)
        .await
        .unwrap();
    engine
        .viewings
        .respond(&proposal.id, "b", Availability::Available, Some(0), None)
        .await
        .unwrap();

    // Not confirmable yet: one member has not responded
    let pending = engine.viewings.evaluate(&proposal.id).await.unwrap();
    assert_eq!(pending.status, roomio_engine::models::ProposalStatus::Pending);

    engine
        .viewings
        .respond(&proposal.id, "c", Availability::Maybe, Some(1), None)
        .await
        .unwrap();

    let confirmed = engine.viewings.evaluate(&proposal.id).await.unwrap();
    assert_eq!(confirmed.status, roomio_engine::models::ProposalStatus::Confirmed);
    assert_eq!(confirmed.proposed_times.len(), 1);
    assert_eq!(confirmed.proposed_times[0].datetime, expected_time);

    // Evaluate is idempotent on the terminal state
    let again = engine.viewings.evaluate(&proposal.id).await.unwrap();
    assert_eq!(again.status, confirmed.status);
    assert_eq!(again.proposed_times[0].datetime, expected_time);

    // Skip the match/group events, then expect the confirmation
    loop {
        match engine.events.recv().await {
            Some(DomainEvent::ProposalConfirmed { proposal_id, .. }) => {
                assert_eq!(proposal_id, proposal.id);
                break;
            }
            Some(_) => continue,
            None => panic!("event stream closed before ProposalConfirmed"),
        }
    }
}

#[tokio::test]
async fn test_latest_response_wins() {
    let engine = engine_with_users(&["a", "b"]).await;

    engine
        .ledger
        .record_swipe("a", "b", SwipeAction::Like)
        .await
        .unwrap();
    let pair = engine
        .ledger
        .record_swipe("b", "a", SwipeAction::Like)
        .await
        .unwrap()
        .matched
        .unwrap();

    let proposal = engine
        .viewings
        .create_proposal(&pair.id, "a", times(2))
        .await
        .unwrap();

    engine
        .viewings
        .respond(&proposal.id, "b", Availability::Unavailable, None, None)
        .await
        .unwrap();
    let updated = engine
        .viewings
        .respond(&proposal.id, "b", Availability::Available, Some(1), None)
        .await
        .unwrap();

    assert_eq!(updated.responses.len(), 1);
    let response = updated.response_for("b").unwrap();
    assert_eq!(response.response, Availability::Available);
    assert_eq!(response.selected_time_index, Some(1));
}

#[tokio::test]
async fn test_single_refusal_keeps_proposal_pending() {
    let engine = engine_with_users(&["a", "b", "c"]).await;
    let members: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    let group = engine
        .matches
        .create_group_match(&members, None, "a")
        .await
        .unwrap();
    let proposal = engine
        .viewings
        .create_proposal(&group.id, "a", times(1))
        .await
        .unwrap();

    engine
        .viewings
        .respond(&proposal.id, "a", Availability::Available, Some(0), None)
        .await
        .unwrap();
    engine
        .viewings
        .respond(&proposal.id, "b", Availability::Available, Some(0), None)
        .await
        .unwrap();
    engine
        .viewings
        .respond(&proposal.id, "c", Availability::Unavailable, None, None)
        .await
        .unwrap();

    // Never auto-cancelled: stays pending for renegotiation
    let evaluated = engine.viewings.evaluate(&proposal.id).await.unwrap();
    assert_eq!(evaluated.status, roomio_engine::models::ProposalStatus::Pending);
}

#[tokio::test]
async fn test_proposal_validation_and_cancellation() {
    let engine = engine_with_users(&["a", "b", "c"]).await;

    engine
        .ledger
        .record_swipe("a", "b", SwipeAction::Like)
        .await
        .unwrap();
    let pair = engine
        .ledger
        .record_swipe("b", "a", SwipeAction::Like)
        .await
        .unwrap()
        .matched
        .unwrap();

    // Empty time list
    let err = engine
        .viewings
        .create_proposal(&pair.id, "a", Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::EmptyProposal));

    // Outsider cannot propose
    let err = engine
        .viewings
        .create_proposal(&pair.id, "c", times(1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotMatchMember));

    let proposal = engine
        .viewings
        .create_proposal(&pair.id, "a", times(2))
        .await
        .unwrap();

    // Out-of-bounds index
    let err = engine
        .viewings
        .respond(&proposal.id, "b", Availability::Available, Some(2), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTimeIndex { index: 2, len: 2 }));

    // Outsider cannot cancel
    let err = engine.viewings.cancel(&proposal.id, "c").await.unwrap_err();
    assert!(matches!(err, EngineError::NotMatchMember));

    // Any member may cancel
    let cancelled = engine.viewings.cancel(&proposal.id, "b").await.unwrap();
    assert_eq!(cancelled.status, roomio_engine::models::ProposalStatus::Cancelled);

    // Terminal states are final
    let err = engine
        .viewings
        .respond(&proposal.id, "a", Availability::Available, Some(0), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
    let err = engine.viewings.cancel(&proposal.id, "a").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    // But evaluate stays idempotent
    let evaluated = engine.viewings.evaluate(&proposal.id).await.unwrap();
    assert_eq!(evaluated.status, roomio_engine::models::ProposalStatus::Cancelled);
}

#[tokio::test]
async fn test_match_listing_is_newest_first() {
    let engine = engine_with_users(&["a", "b", "c"]).await;

    engine
        .ledger
        .record_swipe("a", "b", SwipeAction::Like)
        .await
        .unwrap();
    let first = engine
        .ledger
        .record_swipe("b", "a", SwipeAction::Like)
        .await
        .unwrap()
        .matched
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    engine
        .ledger
        .record_swipe("a", "c", SwipeAction::Like)
        .await
        .unwrap();
    let second = engine
        .ledger
        .record_swipe("c", "a", SwipeAction::Like)
        .await
        .unwrap()
        .matched
        .unwrap();

    let listing = engine.matches.matches_for_user("a").await.unwrap();
    assert_eq!(listing.len(), 2);
    assert_eq!(listing[0].id, second.id);
    assert_eq!(listing[1].id, first.id);
}

#[tokio::test]
async fn test_store_is_visible_across_components() {
    // The invitation manager mutates membership only through the match
    // manager, so the stored entity must reflect the append
    let engine = engine_with_users(&["a", "b", "c", "d"]).await;
    let members: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    let group = engine
        .matches
        .create_group_match(&members, None, "b")
        .await
        .unwrap();

    let invitation = engine.invitations.invite(&group.id, "b", "d").await.unwrap();
    engine.invitations.accept(&invitation.id, "d").await.unwrap();

    let stored = engine.store.get_match(&group.id).await.unwrap().unwrap();
    assert_eq!(stored.member_count, 4);
    assert!(stored.has_member("d"));
}
