//! Registration, password login and server-side sessions.

use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordVerifier,
    password_hash::{PasswordHasher, SaltString},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::repos::{CreateUserParams, RepoError, SessionsRepo, UsersRepo};
use crate::domain::entities::{SessionRecord, UserRecord};
use crate::domain::forms::FieldErrors;
use crate::domain::users::validate_signup;

const MIN_SECRET_LEN: usize = 32;
pub const DUPLICATE_USERNAME_MESSAGE: &str = "A user with that username already exists.";

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("invalid signup form: {0}")]
    Invalid(FieldErrors),
    #[error("username or password is incorrect")]
    InvalidCredentials,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Default)]
pub struct SignupDraft {
    pub username: String,
    pub full_name: String,
    pub password: String,
    pub password_confirm: String,
}

/// Who is making the request, resolved from the session cookie.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<UserRecord>);

impl Viewer {
    pub fn user(&self) -> Option<&UserRecord> {
        self.0.as_ref()
    }

    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|user| user.id)
    }
}

/// A signed-in user, present on login-gated routes only.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRecord);

/// A freshly opened session. `token` goes to the client and is never stored.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user: UserRecord,
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    session_ttl: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            session_ttl,
        }
    }

    /// Registers the user and signs them in.
    pub async fn signup(&self, draft: SignupDraft) -> Result<IssuedSession, AccountError> {
        let valid = validate_signup(
            &draft.username,
            &draft.full_name,
            &draft.password,
            &draft.password_confirm,
        )
        .map_err(AccountError::Invalid)?;

        if self
            .users
            .find_user_by_username(&valid.username)
            .await?
            .is_some()
        {
            return Err(duplicate_username());
        }

        let password_hash = hash_password_blocking(valid.password).await?;
        let user = self
            .users
            .create_user(CreateUserParams {
                username: valid.username,
                full_name: valid.full_name,
                password_hash,
                date_joined: OffsetDateTime::now_utc(),
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => duplicate_username(),
                other => AccountError::Repo(other),
            })?;

        info!(user_id = user.id, username = %user.username, "user registered");
        self.open_session(user).await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<IssuedSession, AccountError> {
        let credentials = self
            .users
            .find_credentials(username.trim())
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        let password = password.to_string();
        let hash = credentials.password_hash;
        let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|err| AccountError::Hashing(err.to_string()))?;
        if !verified {
            return Err(AccountError::InvalidCredentials);
        }

        self.open_session(credentials.user).await
    }

    /// Resolves a session token to its user. Unknown, malformed and expired tokens yield `None`.
    pub async fn authenticate(&self, token: &str) -> Result<Option<UserRecord>, AccountError> {
        let Some(parsed) = parse_token(token) else {
            return Ok(None);
        };
        let Some(session) = self.sessions.find_session(parsed.session_id).await? else {
            return Ok(None);
        };

        let hashed_input = hash_secret(&parsed.secret);
        if session.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Ok(None);
        }

        if session.expires_at <= OffsetDateTime::now_utc() {
            if let Err(err) = self.sessions.delete_session(session.id).await {
                warn!(session_id = %session.id, error = %err, "failed to drop expired session");
            }
            return Ok(None);
        }

        Ok(self.users.find_user(session.user_id).await?)
    }

    /// Revokes the session behind `token`. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), AccountError> {
        if let Some(parsed) = parse_token(token) {
            self.sessions.delete_session(parsed.session_id).await?;
        }
        Ok(())
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64, AccountError> {
        Ok(self
            .sessions
            .delete_expired_sessions(OffsetDateTime::now_utc())
            .await?)
    }

    async fn open_session(&self, user: UserRecord) -> Result<IssuedSession, AccountError> {
        let session_id = Uuid::new_v4();
        let secret = generate_secret();
        let now = OffsetDateTime::now_utc();
        let expires_at = now + self.session_ttl;

        self.sessions
            .create_session(SessionRecord {
                id: session_id,
                user_id: user.id,
                hashed_secret: hash_secret(&secret),
                created_at: now,
                expires_at,
            })
            .await?;

        Ok(IssuedSession {
            user,
            token: format!("{session_id}.{secret}"),
            expires_at,
        })
    }
}

fn duplicate_username() -> AccountError {
    AccountError::Invalid(FieldErrors::single("username", DUPLICATE_USERNAME_MESSAGE))
}

async fn hash_password_blocking(password: String) -> Result<String, AccountError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|err| AccountError::Hashing(err.to_string()))?
}

/// Argon2id PHC string for storage.
pub fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|err| AccountError::Hashing(err.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AccountError::Hashing(err.to_string()))
}

/// `false` for a wrong password and for an unreadable stored hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            warn!(error = %err, "stored password hash is malformed");
            false
        }
    }
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

struct ParsedToken {
    session_id: Uuid,
    secret: String,
}

fn parse_token(token: &str) -> Option<ParsedToken> {
    let (id, secret) = token.split_once('.')?;
    let session_id = Uuid::parse_str(id).ok()?;
    if secret.len() < MIN_SECRET_LEN {
        return None;
    }
    Some(ParsedToken {
        session_id,
        secret: secret.to_string(),
    })
}
