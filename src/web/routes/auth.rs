use axum::{
    Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::{get, post, put},
};
use tower_cookies::{Cookie, Cookies, cookie::SameSite};

use crate::{
    Config,
    auth::{self, TokenKind, UserClaims, hash_password, verify_password},
    events::DomainEvent,
    model::{
        CrudRepository, ResourceTyped,
        entity::{UserCreate, UserEntity, UserUpdate},
    },
    web::{
        ApiResponse, AppState, RequestContext, UserRole, WebError, WebResult,
        dto::{
            ValidatedJson,
            auth::{
                AuthResponse, ChangePasswordBody, LoginBody, OAuthCallbackQuery, ProfileBody,
                RefreshBody, RegisterBody, TokenResponse,
            },
        },
        error::ErrorResponse,
        middlewares::AUTH_TOKEN,
    },
};

static OAUTH_STATE: &str = "oauth_state";

pub fn routes<S>(state: AppState) -> Router<S> {
    let mut router = Router::new()
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/refresh", post(refresh_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/auth/me", get(me_handler))
        .route("/api/auth/profile", put(profile_handler))
        .route("/api/auth/password", put(password_handler));

    // without a configured provider these paths simply do not exist
    if state.google().is_some() {
        router = router
            .route("/api/auth/google", get(google_redirect_handler))
            .route("/api/auth/google/callback", get(google_callback_handler));
    }

    router.with_state(state)
}

fn issue_tokens(config: &Config, user: &UserEntity) -> WebResult<(String, String)> {
    let secret = config.app().jwt();
    let access = UserClaims::new(
        user.id(),
        user.role(),
        TokenKind::Access,
        config.app().access_token_ttl(),
    );
    let refresh = UserClaims::new(
        user.id(),
        user.role(),
        TokenKind::Refresh,
        config.app().refresh_token_ttl(),
    );

    let access = auth::generate_token(access, secret)
        .map_err(|e| WebError::server_crypt_error(e.into()))?;
    let refresh = auth::generate_token(refresh, secret)
        .map_err(|e| WebError::server_crypt_error(e.into()))?;
    Ok((access, refresh))
}

fn set_session_cookie(cookies: &Cookies, config: &Config, token: String) {
    let mut cookie = Cookie::new(AUTH_TOKEN, token);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_http_only(true);
    cookie.set_secure(config.app().is_production());
    cookie.set_path("/");
    cookies.add(cookie);
}

fn clear_cookie(cookies: &Cookies, name: &'static str) {
    let mut cookie = Cookie::from(name);
    cookie.set_path("/");
    cookies.remove(cookie);
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterBody,
    description = "Creates a student or instructor account",
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 403, description = "Admin accounts cannot be registered", body = ErrorResponse),
        (status = 409, description = "Email already in use", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "auth"
)]
async fn register_handler(
    State(state): State<AppState>,
    cookies: Cookies,
    ValidatedJson(payload): ValidatedJson<RegisterBody>,
) -> WebResult<impl IntoResponse> {
    let role = payload.role.unwrap_or(UserRole::Student);
    if role == UserRole::Admin {
        return Err(WebError::registration_admin_forbidden());
    }

    let taken = UserEntity::email_taken(state.pool(), &payload.email)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;
    if taken {
        return Err(WebError::registration_conflict());
    }

    let hash = hash_password(&payload.password).map_err(WebError::server_crypt_error)?;
    let created = UserEntity::create(
        state.pool(),
        UserCreate {
            name: payload.name.trim().to_string(),
            email: payload.email,
            password_hash: Some(hash),
            role,
            google_id: None,
            avatar_url: None,
        },
    )
    .await
    .map_err(|e| match e {
        // two registrations racing for the same email
        e if e.is_unique_violation() => WebError::registration_conflict(),
        e => WebError::resource_fetch_error(UserEntity::get_resource_type(), e),
    })?;

    let (access_token, refresh_token) = issue_tokens(state.config(), &created)?;
    set_session_cookie(&cookies, state.config(), access_token.clone());

    tracing::info!(user_id = %created.id(), role = %role, "user registered");
    state.events().publish(DomainEvent::UserRegistered {
        user_id: created.id(),
        name: created.name().to_string(),
        email: created.email().to_string(),
    });

    Ok(ApiResponse::created(AuthResponse {
        user: created,
        access_token,
        refresh_token,
    })
    .with_message("User registered successfully."))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginBody,
    description = "Authenticates with email and password",
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "auth"
)]
async fn login_handler(
    State(state): State<AppState>,
    cookies: Cookies,
    ValidatedJson(payload): ValidatedJson<LoginBody>,
) -> WebResult<impl IntoResponse> {
    let found = UserEntity::find_by_email(state.pool(), &payload.email)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?
        .ok_or_else(WebError::auth_invalid_credentials)?;

    // accounts created through OAuth have no password
    let Some(hash) = found.hash() else {
        return Err(WebError::auth_invalid_credentials());
    };

    let is_verified =
        verify_password(hash, &payload.password).map_err(WebError::server_crypt_error)?;
    if !is_verified {
        tracing::debug!(user_id = %found.id(), "password mismatch");
        return Err(WebError::auth_invalid_credentials());
    }

    UserEntity::touch_last_login(state.pool(), found.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;

    let (access_token, refresh_token) = issue_tokens(state.config(), &found)?;
    set_session_cookie(&cookies, state.config(), access_token.clone());

    Ok(ApiResponse::ok(AuthResponse {
        user: found,
        access_token,
        refresh_token,
    })
    .with_message("Login successful."))
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshBody,
    description = "Trades a refresh token for a new access token",
    responses(
        (status = 200, description = "New access token", body = TokenResponse),
        (status = 401, description = "Refresh token invalid", body = ErrorResponse),
    ),
    tag = "auth"
)]
async fn refresh_handler(
    State(state): State<AppState>,
    cookies: Cookies,
    ValidatedJson(payload): ValidatedJson<RefreshBody>,
) -> WebResult<impl IntoResponse> {
    let claims = auth::process_token(&payload.refresh_token, state.config().app().jwt())
        .map_err(WebError::auth_token_invalid)?
        .claims;
    if claims.typ != TokenKind::Refresh {
        return Err(WebError::auth_wrong_token_kind());
    }

    let id = claims.user_id().ok_or_else(WebError::auth_token_rejected)?;
    let user = UserEntity::find_by_id(state.pool(), id)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?
        .ok_or_else(WebError::auth_token_rejected)?;

    let access = UserClaims::new(
        user.id(),
        user.role(),
        TokenKind::Access,
        state.config().app().access_token_ttl(),
    );
    let access_token = auth::generate_token(access, state.config().app().jwt())
        .map_err(|e| WebError::server_crypt_error(e.into()))?;
    set_session_cookie(&cookies, state.config(), access_token.clone());

    Ok(ApiResponse::ok(TokenResponse { access_token }))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    description = "Clears the session cookie",
    responses(
        (status = 200, description = "Signed out"),
    ),
    tag = "auth"
)]
async fn logout_handler(cookies: Cookies) -> impl IntoResponse {
    clear_cookie(&cookies, AUTH_TOKEN);
    ApiResponse::message("Logged out successfully.")
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    description = "Returns the signed in user",
    responses(
        (status = 200, description = "Current user", body = UserEntity),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
async fn me_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let found = super::fetch::<UserEntity>(&state, user.user_id()).await?;
    Ok(ApiResponse::ok(found))
}

#[utoipa::path(
    put,
    path = "/api/auth/profile",
    request_body = ProfileBody,
    description = "Updates name, bio and avatar of the signed in user",
    responses(
        (status = 200, description = "Profile updated", body = UserEntity),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
async fn profile_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ProfileBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let update = UserUpdate {
        name: payload.name.map(|n| n.trim().to_string()),
        bio: payload.bio,
        avatar_url: payload.avatar_url,
    };

    let updated = UserEntity::update(state.pool(), user.user_id(), update)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(UserEntity::get_resource_type()))?;

    Ok(ApiResponse::ok(updated).with_message("Profile updated successfully."))
}

#[utoipa::path(
    put,
    path = "/api/auth/password",
    request_body = ChangePasswordBody,
    description = "Changes the password of the signed in user",
    responses(
        (status = 200, description = "Password changed"),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 422, description = "Current password wrong or new password weak", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
async fn password_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ChangePasswordBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    if payload.reuses_current() {
        return Err(WebError::validation(
            "new_password",
            "New password must be different from the current password.",
        ));
    }

    let found = super::fetch::<UserEntity>(&state, user.user_id()).await?;
    let matches = match found.hash() {
        Some(hash) => {
            verify_password(hash, &payload.current_password).map_err(WebError::server_crypt_error)?
        }
        None => false,
    };
    if !matches {
        return Err(WebError::validation(
            "current_password",
            "Current password is incorrect.",
        ));
    }

    let hash = hash_password(&payload.new_password).map_err(WebError::server_crypt_error)?;
    UserEntity::set_password(state.pool(), found.id(), &hash)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;

    tracing::info!(user_id = %found.id(), "password changed");
    Ok(ApiResponse::message("Password changed successfully."))
}

#[utoipa::path(
    get,
    path = "/api/auth/google",
    description = "Redirects to the Google consent screen",
    responses(
        (status = 303, description = "Redirect to Google"),
        (status = 404, description = "Google sign-in is not configured"),
    ),
    tag = "auth"
)]
async fn google_redirect_handler(
    State(state): State<AppState>,
    cookies: Cookies,
) -> WebResult<impl IntoResponse> {
    let google = state
        .google()
        .ok_or_else(|| WebError::auth_oauth_failed("Google sign-in is not configured"))?;
    let (url, csrf) = google.authorize_url();

    let mut cookie = Cookie::new(OAUTH_STATE, csrf.secret().to_string());
    cookie.set_same_site(SameSite::Lax);
    cookie.set_http_only(true);
    cookie.set_path("/");
    cookies.add(cookie);

    Ok(Redirect::to(url.as_str()))
}

#[utoipa::path(
    get,
    path = "/api/auth/google/callback",
    params(OAuthCallbackQuery),
    description = "Finishes Google sign-in and redirects to the frontend with a token",
    responses(
        (status = 303, description = "Redirect to the frontend"),
        (status = 401, description = "Sign-in failed", body = ErrorResponse),
    ),
    tag = "auth"
)]
async fn google_callback_handler(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(query): Query<OAuthCallbackQuery>,
) -> WebResult<impl IntoResponse> {
    let google = state
        .google()
        .ok_or_else(|| WebError::auth_oauth_failed("Google sign-in is not configured"))?;

    if let Some(error) = query.error {
        return Err(WebError::auth_oauth_failed(error));
    }

    let expected = cookies.get(OAUTH_STATE).map(|c| c.value().to_string());
    clear_cookie(&cookies, OAUTH_STATE);
    if expected.is_none() || expected != query.state {
        return Err(WebError::auth_oauth_failed("state mismatch"));
    }

    let code = query
        .code
        .ok_or_else(|| WebError::auth_oauth_failed("missing authorization code"))?;
    let profile = google.exchange(code).await.map_err(|e| {
        tracing::warn!(error = %e, "google token exchange failed");
        WebError::auth_oauth_failed(e.to_string())
    })?;

    let db_error = |e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e);
    let user = match UserEntity::find_by_google_id(state.pool(), &profile.sub)
        .await
        .map_err(db_error)?
    {
        Some(user) => user,
        None => match UserEntity::find_by_email(state.pool(), &profile.email)
            .await
            .map_err(db_error)?
        {
            Some(existing) => {
                UserEntity::link_google(
                    state.pool(),
                    existing.id(),
                    &profile.sub,
                    profile.picture.as_deref(),
                )
                .await
                .map_err(db_error)?
            }
            None => {
                let name = profile
                    .name
                    .clone()
                    .unwrap_or_else(|| profile.email.split('@').next().unwrap_or_default().to_string());
                let created = UserEntity::create(
                    state.pool(),
                    UserCreate {
                        name,
                        email: profile.email.clone(),
                        password_hash: None,
                        role: UserRole::Student,
                        google_id: Some(profile.sub.clone()),
                        avatar_url: profile.picture.clone(),
                    },
                )
                .await
                .map_err(db_error)?;

                state.events().publish(DomainEvent::UserRegistered {
                    user_id: created.id(),
                    name: created.name().to_string(),
                    email: created.email().to_string(),
                });
                created
            }
        },
    };

    UserEntity::touch_last_login(state.pool(), user.id())
        .await
        .map_err(db_error)?;

    let (access_token, refresh_token) = issue_tokens(state.config(), &user)?;
    set_session_cookie(&cookies, state.config(), access_token.clone());

    let target = format!(
        "{}/auth/callback?token={}&refresh_token={}",
        state.config().app().frontend_url().trim_end_matches('/'),
        access_token,
        refresh_token
    );
    Ok(Redirect::to(&target))
}
