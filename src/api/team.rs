//! Team member API endpoints.

use axum::extract::{Multipart, Path, State};

use super::form::{parse_member_id, read_member_form};
use super::{success, ApiResponse, ApiResult};
use crate::models::{MemberUpdate, NewMember, TeamMember};
use crate::AppState;

/// GET /api/team - List all members, oldest first.
pub async fn list_team(State(state): State<AppState>) -> ApiResult<Vec<TeamMember>> {
    success(state.team.list().await?)
}

/// GET /api/team/:id - Get a single member.
pub async fn get_team_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<TeamMember> {
    let id = parse_member_id(&id)?;
    success(state.team.get(id).await?)
}

/// POST /api/team - Create a member from a multipart form with a photo.
pub async fn create_team_member(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<TeamMember> {
    let form = read_member_form(multipart).await?;
    let member = NewMember::try_from(form)?;

    let created = state.team.create(member).await?;
    Ok(ApiResponse::created(created))
}

/// PATCH /api/team/:id - Update the supplied fields and optionally the photo.
pub async fn update_team_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ApiResult<TeamMember> {
    let id = parse_member_id(&id)?;
    let update = MemberUpdate::from(read_member_form(multipart).await?);

    success(state.team.update(id, update).await?)
}

/// DELETE /api/team/:id - Delete a member and its photo.
pub async fn delete_team_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = parse_member_id(&id)?;
    state.team.delete(id).await?;
    success(())
}
