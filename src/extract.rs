use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
};

use crate::{error::AppError, models::TokenBody};

/// `Query` whose rejections answer with the JSON error body.
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Form token carried in a DELETE body. A missing or blank body yields no token,
/// so the token check rather than content negotiation answers the request.
#[derive(Debug, Default)]
pub struct FormToken(pub Option<String>);

impl<S> FromRequest<S> for FormToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request(
        req: Request,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let bytes = Bytes::from_request(req, state).await?;
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(FormToken(None));
            }
            let body: TokenBody = serde_json::from_slice(&bytes).map_err(AppError::bad_request)?;
            Ok(FormToken(body.token))
        }
    }
}
