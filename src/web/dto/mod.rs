//! Request and response bodies of the HTTP API.

use axum::{
    Json,
    extract::{FromRequest, Request},
};
use serde::{Deserialize, de::DeserializeOwned};
use validator::Validate;

use crate::web::{WebError, error::ValidationError};

pub mod assignments;
pub mod auth;
pub mod content;
pub mod courses;
pub mod notifications;
pub mod quizzes;
pub mod reviews;
pub mod users;

/// JSON body that has passed its `validator` rules.
///
/// A body that cannot be parsed is reported as a validation error on `body`.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| WebError::validation("body", rejection.body_text()))?;

        value
            .validate()
            .map_err(|e| WebError::ValidationError(ValidationError::from(e)))?;
        Ok(Self(value))
    }
}

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams, utoipa::ToSchema)]
#[into_params(parameter_in = Query)]
pub struct PaginationQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

impl PaginationQuery {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self { limit, offset }
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Rejects strings that are empty once trimmed.
pub(crate) fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        let mut error = validator::ValidationError::new("blank");
        error.message = Some("must not be blank".into());
        return Err(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_bounds() {
        let page = PaginationQuery::default();
        assert_eq!(page.limit(), 20);
        assert_eq!(page.offset(), 0);

        let page = PaginationQuery::new(Some(10_000), Some(-5));
        assert_eq!(page.limit(), 100);
        assert_eq!(page.offset(), 0);

        assert_eq!(PaginationQuery::new(Some(0), None).limit(), 1);
    }

    #[test]
    fn blank_strings_are_rejected() {
        assert!(not_blank("  ").is_err());
        assert!(not_blank(" x ").is_ok());
    }
}
