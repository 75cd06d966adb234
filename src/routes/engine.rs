use std::collections::HashMap;
use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};
use validator::Validate;

use crate::core::{EngineError, InvitationManager, MatchManager, SwipeLedger, ViewingEngine};
use crate::models::{
    ActingUserRequest, Availability, CreateGroupRequest, CreateProposalRequest, ErrorResponse,
    HealthResponse, InvitationListResponse, InviteRequest, MatchListResponse,
    ProposalListResponse, RecordSwipeRequest, RecordSwipeResponse, RespondRequest, SwipeAction,
};
use crate::services::EngineStore;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EngineStore>,
    pub ledger: Arc<SwipeLedger>,
    pub matches: Arc<MatchManager>,
    pub invitations: Arc<InvitationManager>,
    pub viewings: Arc<ViewingEngine>,
}

/// Configure all engine routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/swipes", web::post().to(record_swipe))
        .route("/matches", web::get().to(list_matches))
        .route("/matches/group", web::post().to(create_group_match))
        .route("/matches/{id}/block", web::post().to(block_match))
        .route("/matches/{id}/unblock", web::post().to(unblock_match))
        .route("/invitations", web::post().to(invite))
        .route("/invitations", web::get().to(list_invitations))
        .route("/invitations/{id}/accept", web::post().to(accept_invitation))
        .route("/invitations/{id}/decline", web::post().to(decline_invitation))
        .route("/viewings", web::post().to(create_proposal))
        .route("/viewings", web::get().to(list_proposals))
        .route("/viewings/{id}/respond", web::post().to(respond_to_proposal))
        .route("/viewings/{id}/evaluate", web::post().to(evaluate_proposal))
        .route("/viewings/{id}/cancel", web::post().to(cancel_proposal));
}

fn status_for(err: &EngineError) -> StatusCode {
    match err {
        EngineError::InvalidSwipe(_)
        | EngineError::InvalidGroupSize(_)
        | EngineError::EmptyProposal
        | EngineError::InvalidTimeIndex { .. } => StatusCode::BAD_REQUEST,
        EngineError::NotInvitee | EngineError::NotGroupMember | EngineError::NotMatchMember => {
            StatusCode::FORBIDDEN
        }
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::DuplicateMatch
        | EngineError::GroupFull
        | EngineError::AlreadyMember
        | EngineError::DuplicateInvitation
        | EngineError::InvalidState(_) => StatusCode::CONFLICT,
        EngineError::InvitationExpired => StatusCode::GONE,
        EngineError::Store(_) | EngineError::Directory(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn engine_error(err: EngineError) -> HttpResponse {
    let status = status_for(&err);
    if status == StatusCode::SERVICE_UNAVAILABLE {
        tracing::error!("Engine call failed: {}", err);
    } else {
        tracing::debug!("Engine call rejected: {}", err);
    }

    HttpResponse::build(status).json(ErrorResponse {
        error: err.kind().to_string(),
        message: err.to_string(),
        status_code: status.as_u16(),
    })
}

fn validation_error(errors: validator::ValidationErrors) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: "validation_failed".to_string(),
        message: errors.to_string(),
        status_code: 400,
    })
}

fn missing_param(name: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: "missing_parameter".to_string(),
        message: format!("{} query parameter is required", name),
        status_code: 400,
    })
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let store_healthy = state.store.health_check().await;
    let status = if store_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Record a swipe
///
/// POST /api/v1/swipes
///
/// Request body:
/// ```json
/// {
///   "swiperId": "string",
///   "targetId": "string",
///   "action": "like|pass|superlike"
/// }
/// ```
async fn record_swipe(
    state: web::Data<AppState>,
    req: web::Json<RecordSwipeRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    let action = match req.action.parse::<SwipeAction>() {
        Ok(action) => action,
        Err(message) => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: "invalid_action".to_string(),
                message,
                status_code: 400,
            });
        }
    };

    match state
        .ledger
        .record_swipe(&req.swiper_id, &req.target_id, action)
        .await
    {
        Ok(outcome) => HttpResponse::Ok().json(RecordSwipeResponse {
            swipe: outcome.swipe,
            matched: outcome.matched,
        }),
        Err(err) => engine_error(err),
    }
}

/// List a user's matches, newest first
///
/// GET /api/v1/matches?userId={userId}
async fn list_matches(
    state: web::Data<AppState>,
    query: web::Query<HashMap<String, String>>,
) -> impl Responder {
    let user_id = match query.get("userId") {
        Some(id) => id,
        None => return missing_param("userId"),
    };

    match state.matches.matches_for_user(user_id).await {
        Ok(matches) => {
            let count = matches.len();
            HttpResponse::Ok().json(MatchListResponse { matches, count })
        }
        Err(err) => engine_error(err),
    }
}

/// Create a group match explicitly
///
/// POST /api/v1/matches/group
async fn create_group_match(
    state: web::Data<AppState>,
    req: web::Json<CreateGroupRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    match state
        .matches
        .create_group_match(&req.users, req.group_name.clone(), &req.created_by)
        .await
    {
        Ok(group) => HttpResponse::Created().json(group),
        Err(err) => engine_error(err),
    }
}

async fn block_match(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    match state.matches.block_match(&path.into_inner()).await {
        Ok(m) => HttpResponse::Ok().json(m),
        Err(err) => engine_error(err),
    }
}

async fn unblock_match(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    match state.matches.unblock_match(&path.into_inner()).await {
        Ok(m) => HttpResponse::Ok().json(m),
        Err(err) => engine_error(err),
    }
}

/// Invite a user into a group match
///
/// POST /api/v1/invitations
async fn invite(state: web::Data<AppState>, req: web::Json<InviteRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    match state
        .invitations
        .invite(&req.group_id, &req.inviter_id, &req.invitee_id)
        .await
    {
        Ok(invitation) => HttpResponse::Created().json(invitation),
        Err(err) => engine_error(err),
    }
}

/// List a user's open invitations
///
/// GET /api/v1/invitations?userId={userId}
async fn list_invitations(
    state: web::Data<AppState>,
    query: web::Query<HashMap<String, String>>,
) -> impl Responder {
    let user_id = match query.get("userId") {
        Some(id) => id,
        None => return missing_param("userId"),
    };

    match state.invitations.invitations_for_user(user_id).await {
        Ok(invitations) => {
            let count = invitations.len();
            HttpResponse::Ok().json(InvitationListResponse { invitations, count })
        }
        Err(err) => engine_error(err),
    }
}

async fn accept_invitation(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<ActingUserRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    match state
        .invitations
        .accept(&path.into_inner(), &req.user_id)
        .await
    {
        Ok(group) => HttpResponse::Ok().json(group),
        Err(err) => engine_error(err),
    }
}

async fn decline_invitation(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<ActingUserRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    match state
        .invitations
        .decline(&path.into_inner(), &req.user_id)
        .await
    {
        Ok(invitation) => HttpResponse::Ok().json(invitation),
        Err(err) => engine_error(err),
    }
}

/// Open a viewing proposal
///
/// POST /api/v1/viewings
async fn create_proposal(
    state: web::Data<AppState>,
    req: web::Json<CreateProposalRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    match state
        .viewings
        .create_proposal(&req.match_id, &req.proposed_by, req.proposed_times.clone())
        .await
    {
        Ok(proposal) => HttpResponse::Created().json(proposal),
        Err(err) => engine_error(err),
    }
}

/// List a match's viewing proposals
///
/// GET /api/v1/viewings?matchId={matchId}
async fn list_proposals(
    state: web::Data<AppState>,
    query: web::Query<HashMap<String, String>>,
) -> impl Responder {
    let match_id = match query.get("matchId") {
        Some(id) => id,
        None => return missing_param("matchId"),
    };

    match state.viewings.proposals_for_match(match_id).await {
        Ok(proposals) => {
            let count = proposals.len();
            HttpResponse::Ok().json(ProposalListResponse { proposals, count })
        }
        Err(err) => engine_error(err),
    }
}

async fn respond_to_proposal(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<RespondRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    let response = match req.response.parse::<Availability>() {
        Ok(response) => response,
        Err(message) => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: "invalid_response".to_string(),
                message,
                status_code: 400,
            });
        }
    };

    match state
        .viewings
        .respond(
            &path.into_inner(),
            &req.user_id,
            response,
            req.selected_time_index,
            req.notes.clone(),
        )
        .await
    {
        Ok(proposal) => HttpResponse::Ok().json(proposal),
        Err(err) => engine_error(err),
    }
}

async fn evaluate_proposal(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    match state.viewings.evaluate(&path.into_inner()).await {
        Ok(proposal) => HttpResponse::Ok().json(proposal),
        Err(err) => engine_error(err),
    }
}

async fn cancel_proposal(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<ActingUserRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    match state
        .viewings
        .cancel(&path.into_inner(), &req.user_id)
        .await
    {
        Ok(proposal) => HttpResponse::Ok().json(proposal),
        Err(err) => engine_error(err),
    }
}
