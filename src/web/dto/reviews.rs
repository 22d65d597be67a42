use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::model::entity::{HelpfulToggle, Review, ReviewUpdate};

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct ReviewBody {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5."))]
    pub rating: i16,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub review_text: String,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct ReviewUpdateBody {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5."))]
    pub rating: Option<i16>,
    #[validate(length(max = 2000))]
    pub review_text: Option<String>,
}

impl From<ReviewUpdateBody> for ReviewUpdate {
    fn from(body: ReviewUpdateBody) -> Self {
        Self {
            rating: body.rating,
            review_text: body.review_text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CannotReviewReason {
    NotEnrolled,
    AlreadyReviewed,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CanReviewResponse {
    pub can_review: bool,
    pub reason: Option<CannotReviewReason>,
}

impl CanReviewResponse {
    pub fn new(is_enrolled: bool, has_review: bool) -> Self {
        let reason = if !is_enrolled {
            Some(CannotReviewReason::NotEnrolled)
        } else if has_review {
            Some(CannotReviewReason::AlreadyReviewed)
        } else {
            None
        };

        Self {
            can_review: reason.is_none(),
            reason,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HelpfulResponse {
    pub review: Review,
    pub action: HelpfulToggle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_range() {
        for (rating, ok) in [(0, false), (1, true), (5, true), (6, false)] {
            let body = ReviewBody {
                rating,
                review_text: String::new(),
            };
            assert_eq!(body.validate().is_ok(), ok, "rating {rating}");
        }
    }

    #[test]
    fn can_review_reasons() {
        let r = CanReviewResponse::new(false, false);
        assert!(!r.can_review);
        assert_eq!(r.reason, Some(CannotReviewReason::NotEnrolled));

        let r = CanReviewResponse::new(true, true);
        assert_eq!(r.reason, Some(CannotReviewReason::AlreadyReviewed));

        let r = CanReviewResponse::new(true, false);
        assert!(r.can_review);
        assert_eq!(serde_json::to_value(&r).unwrap()["reason"], serde_json::Value::Null);
    }
}
