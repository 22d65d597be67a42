use serde::Deserialize;

use crate::web::UserRole;

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize, validator::Validate, utoipa::ToSchema)]
pub struct RoleBody {
    pub role: UserRole,
}
