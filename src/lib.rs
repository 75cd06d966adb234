//! Roomio Engine - matching and viewing-negotiation engine for the Roomio roommate app
//!
//! This library decides which users may communicate, forms pairwise and
//! group matches from mutual likes, manages invitations into group
//! matches, and negotiates viewing times among matched parties.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{
    compatibility_score, EngineError, InvitationManager, MatchManager, SwipeLedger, SwipeOutcome,
    ViewingEngine,
};
pub use models::{
    CompatibilityResult, GroupInvitation, Match, PairKey, ProfileBundle, ScoringWeights, Swipe,
    SwipeAction, ViewingProposal,
};
