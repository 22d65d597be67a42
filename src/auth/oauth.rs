//! Google sign-in over the authorization code flow.

use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    RedirectUrl, Scope, TokenResponse, TokenUrl, basic::BasicClient, url::Url,
};
use serde::Deserialize;
use thiserror::Error;

use crate::config::{ConfigError, ConfigResult, OAuthProvider};

static GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
static GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
static GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

pub type GoogleClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("token exchange failed: {0}")]
    TokenExchange(String),
    #[error("profile request failed: {0}")]
    Profile(#[from] reqwest::Error),
    #[error("provider returned an unverified email")]
    UnverifiedEmail,
}

/// Subset of the OpenID Connect userinfo payload we rely on.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    pub sub: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

#[derive(Clone)]
pub struct GoogleOAuth {
    client: GoogleClient,
    http: reqwest::Client,
}

impl std::fmt::Debug for GoogleOAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleOAuth").finish_non_exhaustive()
    }
}

impl GoogleOAuth {
    pub fn from_config(provider: &OAuthProvider) -> ConfigResult<Self> {
        let invalid = |key: &'static str| {
            move |e: oauth2::url::ParseError| ConfigError::InvalidValue {
                key,
                reason: e.to_string(),
            }
        };

        let client = BasicClient::new(ClientId::new(provider.client_id().to_string()))
            .set_client_secret(ClientSecret::new(provider.client_secret().to_string()))
            .set_auth_uri(AuthUrl::new(GOOGLE_AUTH_URL.to_string()).map_err(invalid("oauth.google.auth_url"))?)
            .set_token_uri(TokenUrl::new(GOOGLE_TOKEN_URL.to_string()).map_err(invalid("oauth.google.token_url"))?)
            .set_redirect_uri(
                RedirectUrl::new(provider.redirect_url().to_string())
                    .map_err(invalid("oauth.google.redirect_url"))?,
            );

        // token endpoint responses must never be followed across redirects
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "oauth.google",
                reason: e.to_string(),
            })?;

        Ok(Self { client, http })
    }

    pub fn authorize_url(&self) -> (Url, CsrfToken) {
        self.client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .url()
    }

    pub async fn exchange(&self, code: String) -> Result<GoogleProfile, OAuthError> {
        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .request_async(&self.http)
            .await
            .map_err(|e| OAuthError::TokenExchange(e.to_string()))?;

        let profile = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(token.access_token().secret())
            .send()
            .await?
            .error_for_status()?
            .json::<GoogleProfile>()
            .await?;

        if !profile.email_verified {
            return Err(OAuthError::UnverifiedEmail);
        }

        Ok(profile)
    }
}
