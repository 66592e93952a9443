//! Request extractors.
//!
//! Body, query and path rejections are turned into [`ApiError`] so every
//! failure leaves through the same envelope.

use crate::error::ApiError;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    http::request::Parts,
};
use incident_types::{CallerContext, Role, UserId};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// JSON body
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Path parameters
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Authenticated caller, read from the headers set by the upstream
/// authentication layer.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub CallerContext);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id: UserId = header(parts, USER_ID_HEADER)?
            .parse()
            .map_err(|_| ApiError::Unauthorized(format!("invalid {USER_ID_HEADER} header")))?;
        let role: Role = header(parts, USER_ROLE_HEADER)?
            .parse()
            .map_err(|_| ApiError::Unauthorized(format!("invalid {USER_ROLE_HEADER} header")))?;

        Ok(Caller(CallerContext::new(id, role)))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {name} header")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<Caller, ApiError> {
        let (mut parts, _) = request.into_parts();
        Caller::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_caller_from_headers() {
        let id = UserId::generate();
        let request = Request::builder()
            .header(USER_ID_HEADER, id.to_string())
            .header(USER_ROLE_HEADER, "admin")
            .body(())
            .unwrap();

        let Caller(caller) = extract(request).await.unwrap();
        assert_eq!(caller.id, id);
        assert!(caller.is_admin());
    }

    #[tokio::test]
    async fn test_missing_or_invalid_headers_are_unauthorized() {
        let missing = Request::builder().body(()).unwrap();
        assert!(matches!(
            extract(missing).await,
            Err(ApiError::Unauthorized(_))
        ));

        let bad_id = Request::builder()
            .header(USER_ID_HEADER, "not-a-uuid")
            .header(USER_ROLE_HEADER, "USER")
            .body(())
            .unwrap();
        assert!(matches!(extract(bad_id).await, Err(ApiError::Unauthorized(_))));

        let bad_role = Request::builder()
            .header(USER_ID_HEADER, UserId::generate().to_string())
            .header(USER_ROLE_HEADER, "ROOT")
            .body(())
            .unwrap();
        assert!(matches!(
            extract(bad_role).await,
            Err(ApiError::Unauthorized(_))
        ));
    }
}
