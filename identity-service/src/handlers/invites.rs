//! Invite resources over HTTP.
//!
//! Thin adapters over [`InviteService`](crate::services::InviteService):
//! decode, call, map the result to a status code.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use service_core::error::AppError;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::middleware::BearerToken;
use crate::models::{OrgInvite, OrgMembership, OrgRole, Page, PageParams};
use crate::services::CreateInvite;
use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateInviteBody {
    #[validate(email)]
    pub invitee_email: String,
    pub invitee_id: Option<String>,
    pub role: OrgRole,
    #[validate(length(min = 1))]
    pub redirect_path: String,
}

/// Invite someone to an org.
#[utoipa::path(
    post,
    path = "/groups/{id}/invites",
    params(("id" = Uuid, Path, description = "Org ID")),
    request_body = CreateInviteBody,
    responses(
        (status = 201, description = "Invite created", body = OrgInvite),
        (status = 400, description = "Invalid invite"),
        (status = 401, description = "Missing or invalid credential"),
        (status = 403, description = "Caller is not an org admin"),
        (status = 409, description = "Already a member or already invited"),
    ),
    security(("bearer_auth" = [])),
    tag = "Invites"
)]
pub async fn create_invite(
    State(state): State<AppState>,
    token: BearerToken,
    Path(org_id): Path<Uuid>,
    Json(body): Json<CreateInviteBody>,
) -> Result<(StatusCode, Json<OrgInvite>), AppError> {
    body.validate()?;
    let invite = state
        .invites
        .create_invite(
            &token.0,
            org_id,
            CreateInvite {
                invitee_email: body.invitee_email,
                invitee_id: body.invitee_id,
                role: body.role,
                redirect_path: body.redirect_path,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(invite)))
}

#[utoipa::path(
    get,
    path = "/invites/{id}",
    params(("id" = Uuid, Path, description = "Invite ID")),
    responses(
        (status = 200, description = "Invite", body = OrgInvite),
        (status = 403, description = "Not the invitee, inviter or an org admin"),
        (status = 404, description = "Invite not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Invites"
)]
pub async fn view_invite(
    State(state): State<AppState>,
    token: BearerToken,
    Path(id): Path<Uuid>,
) -> Result<Json<OrgInvite>, AppError> {
    Ok(Json(state.invites.view_invite(&token.0, id).await?))
}

#[utoipa::path(
    delete,
    path = "/invites/{id}",
    params(("id" = Uuid, Path, description = "Invite ID")),
    responses(
        (status = 204, description = "Invite revoked"),
        (status = 409, description = "Invite is no longer pending"),
    ),
    security(("bearer_auth" = [])),
    tag = "Invites"
)]
pub async fn revoke_invite(
    State(state): State<AppState>,
    token: BearerToken,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.invites.revoke(&token.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/invites/{id}/accept",
    params(("id" = Uuid, Path, description = "Invite ID")),
    responses(
        (status = 200, description = "Membership created", body = OrgMembership),
        (status = 403, description = "Caller is not the invitee"),
        (status = 409, description = "Invite is no longer pending"),
    ),
    security(("bearer_auth" = [])),
    tag = "Invites"
)]
pub async fn accept_invite(
    State(state): State<AppState>,
    token: BearerToken,
    Path(id): Path<Uuid>,
) -> Result<Json<OrgMembership>, AppError> {
    state
        .invites
        .respond(&token.0, id, true)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("Accepted invite has no membership")))
}

#[utoipa::path(
    post,
    path = "/invites/{id}/decline",
    params(("id" = Uuid, Path, description = "Invite ID")),
    responses(
        (status = 204, description = "Invite declined"),
        (status = 403, description = "Caller is not the invitee"),
        (status = 409, description = "Invite is no longer pending"),
    ),
    security(("bearer_auth" = [])),
    tag = "Invites"
)]
pub async fn decline_invite(
    State(state): State<AppState>,
    token: BearerToken,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.invites.respond(&token.0, id, false).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/users/{id}/invites/sent",
    params(
        ("id" = String, Path, description = "User ID"),
        ("offset" = Option<u64>, Query, description = "Items to skip"),
        ("limit" = Option<u64>, Query, description = "Page size, at most 100"),
    ),
    responses(
        (status = 200, description = "Invites sent by the user"),
        (status = 403, description = "Not the user or a platform admin"),
    ),
    security(("bearer_auth" = [])),
    tag = "Invites"
)]
pub async fn list_sent(
    State(state): State<AppState>,
    token: BearerToken,
    Path(user_id): Path<String>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<OrgInvite>>, AppError> {
    Ok(Json(state.invites.list_sent(&token.0, &user_id, &page).await?))
}

#[utoipa::path(
    get,
    path = "/users/{id}/invites/received",
    params(
        ("id" = String, Path, description = "User ID"),
        ("offset" = Option<u64>, Query, description = "Items to skip"),
        ("limit" = Option<u64>, Query, description = "Page size, at most 100"),
    ),
    responses(
        (status = 200, description = "Invites addressed to the user"),
        (status = 403, description = "Not the user or a platform admin"),
    ),
    security(("bearer_auth" = [])),
    tag = "Invites"
)]
pub async fn list_received(
    State(state): State<AppState>,
    token: BearerToken,
    Path(user_id): Path<String>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<OrgInvite>>, AppError> {
    Ok(Json(
        state
            .invites
            .list_received(&token.0, &user_id, &page)
            .await?,
    ))
}
