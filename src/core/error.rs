use thiserror::Error;

use crate::services::profiles::DirectoryError;
use crate::services::store::StoreError;

/// Validation and state failures reported to the caller.
///
/// None of these is fatal to the process; the route layer maps each kind
/// to an HTTP status. Store and directory failures pass through so the
/// caller can distinguish "you may not" from "try again".
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid swipe: {0}")]
    InvalidSwipe(String),

    #[error("a match with this member set already exists")]
    DuplicateMatch,

    #[error("invalid group size: {0}")]
    InvalidGroupSize(String),

    #[error("the group already has the maximum number of members")]
    GroupFull,

    #[error("user is already a member of this match")]
    AlreadyMember,

    #[error("user is not a member of this group")]
    NotGroupMember,

    #[error("a pending invitation for this user already exists")]
    DuplicateInvitation,

    #[error("only the invited user may act on this invitation")]
    NotInvitee,

    #[error("the invitation has expired")]
    InvitationExpired,

    #[error("a proposal needs at least one candidate time")]
    EmptyProposal,

    #[error("user is not a member of this match")]
    NotMatchMember,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("selected time index {index} is out of bounds for {len} proposed times")]
    InvalidTimeIndex { index: usize, len: usize },

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl EngineError {
    /// Stable machine-readable error code for the wire
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidSwipe(_) => "invalid_swipe",
            EngineError::DuplicateMatch => "duplicate_match",
            EngineError::InvalidGroupSize(_) => "invalid_group_size",
            EngineError::GroupFull => "group_full",
            EngineError::AlreadyMember => "already_member",
            EngineError::NotGroupMember => "not_group_member",
            EngineError::DuplicateInvitation => "duplicate_invitation",
            EngineError::NotInvitee => "not_invitee",
            EngineError::InvitationExpired => "invitation_expired",
            EngineError::EmptyProposal => "empty_proposal",
            EngineError::NotMatchMember => "not_match_member",
            EngineError::InvalidState(_) => "invalid_state",
            EngineError::InvalidTimeIndex { .. } => "invalid_time_index",
            EngineError::NotFound(_) => "not_found",
            EngineError::Store(_) => "storage_unavailable",
            EngineError::Directory(_) => "directory_unavailable",
        }
    }
}
