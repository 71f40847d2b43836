use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use service_core::error::AppError;

/// Raw bearer credential from the `Authorization` header.
///
/// Only the header shape is checked here. Whether the credential is valid,
/// and what it may do, is decided by the service the handler calls.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
            })?;

        Ok(BearerToken(token.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header_value: Option<&str>) -> Result<BearerToken, AppError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header_value {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        BearerToken::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_bearer_token_extracted() {
        let token = extract(Some("Bearer abc.def")).await.unwrap();
        assert_eq!(token.0, "abc.def");
    }

    #[tokio::test]
    async fn test_missing_or_malformed_header_rejected() {
        assert!(matches!(extract(None).await, Err(AppError::Unauthorized(_))));
        assert!(matches!(
            extract(Some("Basic dXNlcjpwYXNz")).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            extract(Some("Bearer   ")).await,
            Err(AppError::Unauthorized(_))
        ));
    }
}
