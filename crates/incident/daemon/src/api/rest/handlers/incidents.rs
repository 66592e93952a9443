//! Incident handlers

use crate::api::rest::extract::{ApiJson, ApiPath, ApiQuery, Caller};
use crate::api::rest::state::AppState;
use crate::error::{ApiResponse, ApiResult};
use axum::{extract::State, http::StatusCode, Json};
use incident_types::{
    AuditLogEntry, Incident, IncidentFields, IncidentId, IncidentQuery, Page, Severity, Status,
    UserId,
};
use serde::Deserialize;

/// Query parameters for `GET /incidents`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListIncidentsParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub severity: Option<Severity>,
    pub status: Option<Status>,
    pub user_id: Option<UserId>,
    pub search: Option<String>,
}

impl ListIncidentsParams {
    fn query(&self) -> IncidentQuery {
        IncidentQuery {
            severity: self.severity,
            status: self.status,
            user_id: self.user_id,
            search: self.search.clone(),
        }
    }
}

/// Plain paging parameters
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Assign request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignIncidentRequest {
    pub assigned_to_id: UserId,
}

/// Create an incident, or save into / finalize the caller's draft.
///
/// `isDraft: true` in the body keeps the result a draft.
pub async fn create_incident(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiJson(fields): ApiJson<IncidentFields>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Incident>>)> {
    let finalize = !fields.is_draft.unwrap_or(false);
    let incident = state
        .service
        .create_or_promote(&caller, fields, finalize)
        .await?;

    let message = if incident.is_draft {
        "Draft saved"
    } else {
        "Incident created"
    };
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(incident, message),
    ))
}

pub async fn list_incidents(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiQuery(params): ApiQuery<ListIncidentsParams>,
) -> ApiResult<Json<ApiResponse<Page<Incident>>>> {
    let page = state.page(params.page, params.page_size);
    let incidents = state.service.list(&caller, &params.query(), page).await?;
    Ok(ApiResponse::ok(incidents))
}

/// Admin console listing across all assignees.
pub async fn list_all_incidents(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiQuery(params): ApiQuery<ListIncidentsParams>,
) -> ApiResult<Json<ApiResponse<Page<Incident>>>> {
    let page = state.page(params.page, params.page_size);
    let incidents = state
        .service
        .list_all(&caller, &params.query(), page)
        .await?;
    Ok(ApiResponse::ok(incidents))
}

/// The caller's draft, or `null`.
pub async fn get_draft(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<Json<ApiResponse<Option<Incident>>>> {
    let draft = state.service.get_draft(&caller).await?;
    Ok(ApiResponse::ok(draft))
}

pub async fn delete_draft(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<Json<ApiResponse<Option<()>>>> {
    state.service.delete_draft(&caller).await?;
    Ok(ApiResponse::with_message(None, "Draft deleted"))
}

pub async fn auto_save(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiJson(fields): ApiJson<IncidentFields>,
) -> ApiResult<Json<ApiResponse<Incident>>> {
    let draft = state.service.auto_save(&caller, fields).await?;
    Ok(ApiResponse::with_message(draft, "Draft saved"))
}

pub async fn get_incident(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(id): ApiPath<IncidentId>,
) -> ApiResult<Json<ApiResponse<Incident>>> {
    let incident = state.service.get(&caller, id).await?;
    Ok(ApiResponse::ok(incident))
}

pub async fn update_incident(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(id): ApiPath<IncidentId>,
    ApiJson(fields): ApiJson<IncidentFields>,
) -> ApiResult<Json<ApiResponse<Incident>>> {
    let incident = state.service.update(&caller, id, fields).await?;
    Ok(ApiResponse::with_message(incident, "Incident updated"))
}

pub async fn delete_incident(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(id): ApiPath<IncidentId>,
) -> ApiResult<Json<ApiResponse<Option<()>>>> {
    state.service.delete(&caller, id).await?;
    Ok(ApiResponse::with_message(None, "Incident deleted"))
}

pub async fn assign_incident(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(id): ApiPath<IncidentId>,
    ApiJson(request): ApiJson<AssignIncidentRequest>,
) -> ApiResult<Json<ApiResponse<Incident>>> {
    let incident = state
        .service
        .assign(&caller, id, request.assigned_to_id)
        .await?;
    Ok(ApiResponse::with_message(incident, "Incident assigned"))
}

/// Audit trail of one incident, visible to whoever may read the incident.
pub async fn incident_audit(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(id): ApiPath<IncidentId>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Json<ApiResponse<Page<AuditLogEntry>>>> {
    let page = state.page(params.page, params.page_size);
    let entries = state.service.list_audit(&caller, id, page).await?;
    Ok(ApiResponse::ok(entries))
}
