use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::{model::entity::UserEntity, web::UserRole};

const PASSWORD_SPECIALS: &str = "@$!%*?&";

/// At least eight characters from `[A-Za-z0-9@$!%*?&]` with one of each class.
pub fn password_strength(password: &str) -> Result<(), ValidationError> {
    let allowed = password
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SPECIALS.contains(c));
    let strong = password.chars().count() >= 8
        && allowed
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c));

    if strong {
        return Ok(());
    }

    let mut error = ValidationError::new("password_strength");
    error.message = Some(
        "Password must contain at least one uppercase letter, one lowercase letter, one digit, and one special character."
            .into(),
    );
    Err(error)
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct RegisterBody {
    #[validate(length(min = 3, max = 255, message = "Name must be between 3 and 255 characters."))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email."))]
    pub email: String,
    #[validate(custom(function = "password_strength"))]
    pub password: String,
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct LoginBody {
    #[validate(email(message = "Please provide a valid email."))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required."))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct RefreshBody {
    #[validate(length(min = 1, message = "Refresh token is required."))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct ProfileBody {
    #[validate(length(min = 3, max = 255, message = "Name must be between 3 and 255 characters."))]
    pub name: Option<String>,
    #[validate(length(max = 1000))]
    pub bio: Option<String>,
    #[validate(url(message = "Avatar must be a valid URL."))]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct ChangePasswordBody {
    #[validate(length(min = 1, message = "Current password is required."))]
    pub current_password: String,
    #[validate(custom(function = "password_strength"))]
    pub new_password: String,
}

impl ChangePasswordBody {
    pub fn reuses_current(&self) -> bool {
        self.current_password == self.new_password
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AuthResponse {
    pub user: UserEntity,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_rules() {
        assert!(password_strength("Passw0rd!").is_ok());
        assert!(password_strength("Sh0rt!").is_err());
        assert!(password_strength("password0!").is_err());
        assert!(password_strength("PASSWORD0!").is_err());
        assert!(password_strength("Password!!").is_err());
        assert!(password_strength("Password00").is_err());
        // characters outside the allowed set
        assert!(password_strength("Passw0rd!#").is_err());
    }

    #[test]
    fn register_body_reports_fields() {
        let body = RegisterBody {
            name: String::from("Al"),
            email: String::from("not-an-email"),
            password: String::from("weak"),
            role: None,
        };
        let errors = body.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn new_password_is_checked() {
        let body = ChangePasswordBody {
            current_password: String::from("Passw0rd!"),
            new_password: String::from("Passw0rd!"),
        };
        assert!(body.validate().is_ok());
        assert!(body.reuses_current());

        let body = ChangePasswordBody {
            current_password: String::from("Passw0rd!"),
            new_password: String::from("weak"),
        };
        assert!(body.validate().is_err());
        assert!(!body.reuses_current());
    }
}
