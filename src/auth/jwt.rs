use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::web::UserRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub role: UserRole,
    pub typ: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

impl UserClaims {
    pub fn new(user_id: Uuid, role: UserRole, typ: TokenKind, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.to_string(),
            role,
            typ,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.sub.parse().ok()
    }
}

pub fn generate_token<K: AsRef<[u8]>>(
    claims: UserClaims,
    key: K,
) -> jsonwebtoken::errors::Result<String> {
    let header = Header::default();
    let key = EncodingKey::from_secret(key.as_ref());

    let token = jsonwebtoken::encode(&header, &claims, &key)?;
    Ok(token)
}

pub fn process_token<K: AsRef<[u8]>>(
    token: &str,
    key: K,
) -> jsonwebtoken::errors::Result<TokenData<UserClaims>> {
    let validation = Validation::default();
    let key = DecodingKey::from_secret(key.as_ref());

    let claims = jsonwebtoken::decode::<UserClaims>(token, &key, &validation)?;
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_keeps_role_and_kind() {
        let id = Uuid::new_v4();
        let claims = UserClaims::new(id, UserRole::Instructor, TokenKind::Refresh, Duration::minutes(5));
        let token = generate_token(claims, "key").unwrap();

        let decoded = process_token(&token, "key").unwrap().claims;
        assert_eq!(decoded.user_id(), Some(id));
        assert_eq!(decoded.role, UserRole::Instructor);
        assert_eq!(decoded.typ, TokenKind::Refresh);
    }

    #[test]
    fn wrong_key_is_rejected() {
        let claims = UserClaims::new(Uuid::new_v4(), UserRole::Student, TokenKind::Access, Duration::minutes(5));
        let token = generate_token(claims, "key").unwrap();
        assert!(process_token(&token, "other").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = UserClaims::new(Uuid::new_v4(), UserRole::Student, TokenKind::Access, Duration::minutes(-10));
        let token = generate_token(claims, "key").unwrap();
        assert!(process_token(&token, "key").is_err());
    }
}
