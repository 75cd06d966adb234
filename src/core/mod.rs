// Core engine exports
pub mod error;
pub mod invitations;
pub mod matches;
pub mod scoring;
pub mod swipes;
pub mod viewings;

pub use error::EngineError;
pub use invitations::InvitationManager;
pub use matches::MatchManager;
pub use scoring::{average_compatibility, compatibility_score};
pub use swipes::{SwipeLedger, SwipeOutcome};
pub use viewings::ViewingEngine;
