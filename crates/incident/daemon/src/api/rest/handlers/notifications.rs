//! Notification handlers

use crate::api::rest::extract::{ApiPath, ApiQuery, Caller};
use crate::api::rest::state::AppState;
use crate::error::{ApiResponse, ApiResult};
use axum::{extract::State, Json};
use incident_core::NotificationPage;
use incident_types::{Notification, NotificationFilter, NotificationId};
use serde::{Deserialize, Serialize};

/// Query parameters for `GET /notifications`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotificationsParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub is_read: Option<bool>,
}

/// Mark-all response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiQuery(params): ApiQuery<ListNotificationsParams>,
) -> ApiResult<Json<ApiResponse<NotificationPage>>> {
    let page = state.page(params.page, params.page_size);
    let filter = NotificationFilter {
        is_read: params.is_read,
    };
    let notifications = state
        .service
        .list_notifications(&caller, filter, page)
        .await?;
    Ok(ApiResponse::ok(notifications))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(id): ApiPath<NotificationId>,
) -> ApiResult<Json<ApiResponse<Notification>>> {
    let notification = state.service.mark_notification_read(&caller, id).await?;
    Ok(ApiResponse::ok(notification))
}

pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<Json<ApiResponse<MarkAllReadResponse>>> {
    let updated = state.service.mark_all_notifications_read(&caller).await?;
    Ok(ApiResponse::with_message(
        MarkAllReadResponse { updated },
        "All notifications marked as read",
    ))
}
