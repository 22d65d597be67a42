mod password;
pub use password::{hash_password, verify_password};
mod jwt;
pub use jwt::{TokenKind, UserClaims, generate_token, process_token};
mod error;
pub use error::{CryptError, CryptResult};
mod oauth;
pub use oauth::{GoogleOAuth, GoogleProfile, OAuthError};
