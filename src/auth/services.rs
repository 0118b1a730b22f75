use lazy_static::lazy_static;
use regex::Regex;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::{
    auth::{
        dto::{LoginRequest, RegisterRequest},
        jwt::{JwtKeys, TokenPair},
        password::{hash_password, verify_password, MIN_PASSWORD_LEN},
        repo_types::{NewUser, User},
    },
    db::{exec_tx, Repository},
    error::AppError,
};

/// A user together with the tokens just issued for them.
#[derive(Debug)]
pub struct AuthSession {
    pub user: User,
    pub tokens: TokenPair,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles");
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_registration(name: &str, email: &str, password: &str) -> Result<(), AppError> {
    if name.is_empty() {
        return Err(AppError::Validation("name is required".into()));
    }
    if !is_valid_email(email) {
        return Err(AppError::Validation("invalid email".into()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn already_registered(email: &str) -> AppError {
    AppError::Conflict(format!("email {email} account already registered"))
}

pub async fn register(
    db: &PgPool,
    keys: &JwtKeys,
    req: RegisterRequest,
) -> Result<AuthSession, AppError> {
    let name = req.name.trim().to_string();
    let email = normalize_email(&req.email);
    validate_registration(&name, &email, &req.password)?;

    let password = req.password;
    let conflict_email = email.clone();
    let user = exec_tx(db, move |mut repo| {
        Box::pin(async move {
            if repo.check_user(&email).await?.is_some() {
                return Err(already_registered(&email));
            }
            let password_hash = hash_password(&password)?;
            repo.create_user(NewUser {
                name,
                email,
                password_hash,
            })
            .await
        })
    })
    .await
    .map_err(|e| {
        // two concurrent registrations can both pass the existence check
        if e.is_unique_violation() {
            already_registered(&conflict_email)
        } else {
            e
        }
    })?;

    let tokens = keys.issue_pair(user.id)?;
    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(AuthSession { user, tokens })
}

pub async fn login(
    db: &PgPool,
    keys: &JwtKeys,
    req: LoginRequest,
) -> Result<AuthSession, AppError> {
    let email = normalize_email(&req.email);
    if !is_valid_email(&email) {
        return Err(AppError::Validation("invalid email".into()));
    }

    let mut conn = db.acquire().await?;
    let user = Repository::new(&mut *conn)
        .check_user(&email)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user with email {email}")))?;

    if !verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(AppError::Unauthorized(
            "invalid login: user password not match".into(),
        ));
    }

    let tokens = keys.issue_pair(user.id)?;
    info!(user_id = user.id, "user logged in");
    Ok(AuthSession { user, tokens })
}

pub async fn refresh(
    db: &PgPool,
    keys: &JwtKeys,
    refresh_token: &str,
) -> Result<AuthSession, AppError> {
    let claims = keys
        .verify_refresh(refresh_token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    let user = current_user(db, claims.sub).await?;
    let tokens = keys.issue_pair(user.id)?;
    Ok(AuthSession { user, tokens })
}

/// Loads the user behind a verified token.
pub async fn current_user(db: &PgPool, user_id: i64) -> Result<User, AppError> {
    let mut conn = db.acquire().await?;
    Repository::new(&mut *conn)
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("user not found".into()))
}
