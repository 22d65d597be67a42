use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    model::{Page, entity::Notification},
    web::UserRole,
};

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct NotificationList {
    pub notifications: Page<Notification>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UnreadCount {
    pub count: i64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AffectedRows {
    pub affected: u64,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct SystemNotificationBody {
    #[validate(length(min = 5, max = 100, message = "Title must be between 5 and 100 characters."))]
    pub title: String,
    #[validate(length(min = 10, max = 1000, message = "Message must be between 10 and 1000 characters."))]
    pub message: String,
    /// Only users with this role are notified; everybody when absent.
    pub role: Option<UserRole>,
}
