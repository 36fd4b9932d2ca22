//! Axum route handlers for registration, login and logout.

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, Transaction};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::auth::password::{dummy_hash, hash_password, verify_password};
use crate::auth::session::SESSION_COOKIE;
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::user::UserRow;
use crate::placement::audit;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// Account fields shared by every registration form.
#[derive(Debug, Deserialize, Validate)]
pub struct Credentials {
    #[validate(length(min = 1, max = 150, message = "must be 1-150 characters"))]
    pub username: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password1: String,
    #[validate(must_match(other = "password1", message = "does not match password1"))]
    pub password2: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StudentSignup {
    #[serde(flatten)]
    pub credentials: Credentials,
    #[validate(range(min = 0.0, max = 10.0, message = "must be between 0 and 10"))]
    pub cgpa: f64,
    #[validate(range(min = 0, message = "cannot be negative"))]
    pub backlogs: i32,
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub branch: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub full_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CompanySignup {
    #[serde(flatten)]
    pub credentials: Credentials,
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub company_name: String,
    #[validate(url(message = "must be a valid URL"))]
    pub website: String,
    #[validate(length(min = 1, message = "is required"))]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminSignup {
    #[serde(flatten)]
    pub credentials: Credentials,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserRow,
    pub redirect: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RegisteredResponse {
    pub user: UserRow,
    pub message: String,
}

/// `pg_advisory_xact_lock` key held while an admin account is created.
const ADMIN_BOOTSTRAP_LOCK: i64 = 0x6361_6d70_7573_0001;

#[derive(Clone, Copy)]
enum Role {
    Student,
    Company,
    Admin,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/auth/register/student
pub async fn handle_register_student(
    State(state): State<AppState>,
    Json(req): Json<StudentSignup>,
) -> Result<(StatusCode, Json<RegisteredResponse>), AppError> {
    validate_credentials(&req.credentials)?;
    req.validate()?;

    let mut tx = state.db.begin().await?;
    let user = insert_user(&mut tx, &req.credentials, Role::Student).await?;
    sqlx::query(
        "INSERT INTO student_profiles (user_id, full_name, branch, cgpa, backlogs) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(user.id)
    .bind(req.full_name.trim())
    .bind(req.branch.trim())
    .bind(req.cgpa)
    .bind(req.backlogs)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    info!("Registered student {}", user.username);
    audit::record(&state.db, Some(user.id), "registered as student").await;
    Ok(registered(user))
}

/// POST /api/v1/auth/register/company
pub async fn handle_register_company(
    State(state): State<AppState>,
    Json(req): Json<CompanySignup>,
) -> Result<(StatusCode, Json<RegisteredResponse>), AppError> {
    validate_credentials(&req.credentials)?;
    req.validate()?;

    let mut tx = state.db.begin().await?;
    let user = insert_user(&mut tx, &req.credentials, Role::Company).await?;
    sqlx::query(
        "INSERT INTO company_profiles (user_id, company_name, website, description) VALUES ($1, $2, $3, $4)",
    )
    .bind(user.id)
    .bind(req.company_name.trim())
    .bind(req.website.trim())
    .bind(&req.description)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    info!("Registered company {}", req.company_name);
    audit::record(&state.db, Some(user.id), "registered as company").await;
    Ok(registered(user))
}

/// POST /api/v1/auth/register/admin
///
/// Open while no admin exists so the first account can be bootstrapped;
/// afterwards only an existing admin may create another.
pub async fn handle_register_admin(
    State(state): State<AppState>,
    current: Option<CurrentUser>,
    Json(req): Json<AdminSignup>,
) -> Result<(StatusCode, Json<RegisteredResponse>), AppError> {
    // Held until commit: concurrent bootstraps see each other's admin.
    let mut tx = state.db.begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(ADMIN_BOOTSTRAP_LOCK)
        .execute(&mut *tx)
        .await?;
    let admin_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_admin")
        .fetch_one(&mut *tx)
        .await?;
    admin_signup_allowed(admin_count, current.as_ref().map(|c| &c.user))?;
    validate_credentials(&req.credentials)?;

    let user = insert_user(&mut tx, &req.credentials, Role::Admin).await?;
    tx.commit().await?;

    info!("Registered admin {}", user.username);
    audit::record(
        &state.db,
        current.as_ref().map(|c| c.id()).or(Some(user.id)),
        format!("registered admin {}", user.username),
    )
    .await;
    Ok(registered(user))
}

/// POST /api/v1/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

    let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
        .bind(req.username.trim())
        .fetch_optional(&state.db)
        .await?;
    let Some(user) = user else {
        // Pay the Argon2 cost anyway; timing must not reveal unknown usernames.
        let password = req.password;
        let _ = tokio::task::spawn_blocking(move || verify_password(&password, dummy_hash())).await;
        return Err(invalid());
    };

    let hash = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&req.password, &hash))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password check task failed: {e}")))??;
    if !matches {
        info!("Failed login for {}", user.username);
        return Err(invalid());
    }

    let token = state.sessions.create(user.id).await?;
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);

    info!("User {} logged in", user.username);
    audit::record(&state.db, Some(user.id), "logged in").await;

    let redirect = user.dashboard_path();
    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            user,
            redirect,
            message: "Successfully Logged in!".to_string(),
        }),
    ))
}

/// POST /api/v1/auth/logout
pub async fn handle_logout(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
) -> Result<(CookieJar, Json<serde_json::Value>), AppError> {
    state.sessions.destroy(&current.session_token).await?;
    audit::record(&state.db, Some(current.id()), "logged out").await;

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((
        jar,
        Json(serde_json::json!({ "message": "Successfully Logged out!" })),
    ))
}

/// GET /api/v1/auth/me
pub async fn handle_me(current: CurrentUser) -> Json<UserRow> {
    Json(current.user)
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn registered(user: UserRow) -> (StatusCode, Json<RegisteredResponse>) {
    (
        StatusCode::CREATED,
        Json(RegisteredResponse {
            user,
            message: "Account created successfully.".to_string(),
        }),
    )
}

/// Anyone may create the first admin; once one exists only an admin may.
fn admin_signup_allowed(existing_admins: i64, current: Option<&UserRow>) -> Result<(), AppError> {
    if existing_admins == 0 {
        return Ok(());
    }
    match current {
        Some(user) if user.is_admin => Ok(()),
        Some(_) => Err(AppError::Forbidden),
        None => Err(AppError::Unauthorized("Login required".to_string())),
    }
}

/// Field validation plus the username character set
/// (letters, digits and `@ . + - _`).
fn validate_credentials(credentials: &Credentials) -> Result<(), AppError> {
    credentials.validate()?;
    let username = credentials.username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("username is required".to_string()));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(AppError::Validation(
            "username may only contain letters, digits and @/./+/-/_".to_string(),
        ));
    }
    Ok(())
}

async fn insert_user(
    tx: &mut Transaction<'_, Postgres>,
    credentials: &Credentials,
    role: Role,
) -> Result<UserRow, AppError> {
    let plain = credentials.password1.clone();
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password hash task failed: {e}")))??;

    let user = sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO users (id, username, email, password_hash, is_student, is_company, is_admin)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(credentials.username.trim())
    .bind(credentials.email.trim())
    .bind(&password_hash)
    .bind(matches!(role, Role::Student))
    .bind(matches!(role, Role::Company))
    .bind(matches!(role, Role::Admin))
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict(format!(
            "A user with username '{}' already exists",
            credentials.username.trim()
        )),
        other => other,
    })?;
    Ok(user)
}
