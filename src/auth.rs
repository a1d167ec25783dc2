//! Request-scoped identity.
//!
//! Authentication happens upstream: the fronting proxy asserts the username
//! in the configured header. A handler that takes a [`RequestContext`] is
//! only invoked once that identity has been resolved to a stored user.
//! Otherwise the request is answered with 401 before the handler runs.
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use log::{debug, warn};

use crate::config::Config;
use crate::db::Database;
use crate::error::AppError;
use crate::models::user::USERNAME_MAX_LEN;
use crate::models::User;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user: User,
}

impl RequestContext {
    pub fn user_id(&self) -> i64 {
        self.user.id
    }
}

/// Extracts a usable username from a header value.
pub fn asserted_username(value: Option<&str>) -> Option<&str> {
    let username = value?.trim();
    if username.is_empty() || username.chars().count() > USERNAME_MAX_LEN {
        return None;
    }
    Some(username)
}

impl FromRequest for RequestContext {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let db = req.app_data::<web::Data<Database>>().cloned();
        let username = req
            .app_data::<web::Data<Config>>()
            .and_then(|config| req.headers().get(config.auth_header.as_str()))
            .and_then(|value| value.to_str().ok())
            .and_then(|value| asserted_username(Some(value)))
            .map(str::to_owned);

        Box::pin(async move {
            let Some(username) = username else {
                debug!("[AUTH] Request without an asserted user");
                return Err(AppError::Unauthorized);
            };
            let Some(db) = db else {
                warn!("[AUTH] Database missing from app data");
                return Err(AppError::Unauthorized);
            };
            let user = db.get_or_create_user(&username).await?;
            Ok(RequestContext { user })
        })
    }
}
