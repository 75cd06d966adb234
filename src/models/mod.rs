// Model exports
pub mod domain;
pub mod events;
pub mod requests;
pub mod responses;

pub use domain::{
    Availability, CompatibilityResult, GroupInvitation, HousingRecord, InvitationStatus,
    LifestyleRecord, Match, PairKey, PreferenceRecord, ProfileBundle, ProposalStatus,
    ProposedTime, ScoringWeights, SleepSchedule, Swipe, SwipeAction, UserRecord,
    ViewingProposal, ViewingResponse, MAX_GROUP_SIZE, MIN_GROUP_SIZE,
};
pub use events::DomainEvent;
pub use requests::{
    ActingUserRequest, CreateGroupRequest, CreateProposalRequest, InviteRequest,
    RecordSwipeRequest, RespondRequest,
};
pub use responses::{
    ErrorResponse, HealthResponse, InvitationListResponse, MatchListResponse,
    ProposalListResponse, RecordSwipeResponse,
};
