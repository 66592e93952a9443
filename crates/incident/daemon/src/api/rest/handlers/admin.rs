//! Admin handlers: user management and the tracker-wide audit log

use crate::api::rest::extract::{ApiJson, ApiPath, ApiQuery, Caller};
use crate::api::rest::state::AppState;
use crate::error::{ApiResponse, ApiResult};
use axum::{extract::State, http::StatusCode, Json};
use incident_types::{AuditFilter, AuditLogEntry, IncidentId, Page, Role, User, UserId};
use serde::Deserialize;

use super::PageParams;

/// Create user request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

/// Role change request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub role: Role,
}

/// Query parameters for `GET /admin/audit`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub incident_id: Option<IncidentId>,
    pub actor_id: Option<UserId>,
}

pub async fn list_users(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Json<ApiResponse<Page<User>>>> {
    let page = state.page(params.page, params.page_size);
    let users = state.admin.list_users(&caller, page).await?;
    Ok(ApiResponse::ok(users))
}

pub async fn create_user(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<User>>)> {
    let user = state
        .admin
        .create_user(&caller, &request.email, request.role)
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(user, "User created"),
    ))
}

pub async fn update_user_role(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(id): ApiPath<UserId>,
    ApiJson(request): ApiJson<UpdateRoleRequest>,
) -> ApiResult<Json<ApiResponse<User>>> {
    let user = state
        .admin
        .update_user_role(&caller, id, request.role)
        .await?;
    Ok(ApiResponse::with_message(user, "Role updated"))
}

pub async fn list_audit_log(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiQuery(params): ApiQuery<AuditLogParams>,
) -> ApiResult<Json<ApiResponse<Page<AuditLogEntry>>>> {
    let page = state.page(params.page, params.page_size);
    let filter = AuditFilter {
        incident_id: params.incident_id,
        actor_id: params.actor_id,
    };
    let entries = state.admin.list_audit(&caller, filter, page).await?;
    Ok(ApiResponse::ok(entries))
}

/// Audit trail of one incident through the admin console.
pub async fn incident_audit_log(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(incident_id): ApiPath<IncidentId>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Json<ApiResponse<Page<AuditLogEntry>>>> {
    let page = state.page(params.page, params.page_size);
    let entries = state
        .admin
        .list_audit(&caller, AuditFilter::for_incident(incident_id), page)
        .await?;
    Ok(ApiResponse::ok(entries))
}
