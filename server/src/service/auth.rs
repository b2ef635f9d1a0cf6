use crate::store::{MemoryStore, StoreError, UserRecord};
use chrono::{DateTime, Duration, Utc};
use geotrackcore::model::{SessionPayload, User};
use rand::RngCore;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("all fields are required")]
    MissingFields,
    #[error("password must be at least 6 characters")]
    WeakPassword,
    #[error("a user with this email already exists")]
    DuplicateEmail,
    #[error("this device is already registered to another user")]
    DuplicateDevice,
    #[error("user not found")]
    UserNotFound,
    #[error("this account has no password yet; register to set one")]
    PasswordNotSet,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account is deactivated")]
    Deactivated,
    #[error("missing or expired session")]
    Unauthenticated,
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl AuthError {
    /// HTTP status the bridge answers with.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::MissingFields | AuthError::WeakPassword => 400,
            AuthError::DuplicateEmail | AuthError::DuplicateDevice => 409,
            AuthError::UserNotFound => 404,
            AuthError::PasswordNotSet
            | AuthError::InvalidCredentials
            | AuthError::Unauthenticated => 401,
            AuthError::Deactivated => 403,
            AuthError::Storage(_) => 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub password: String,
}

/// Registration outcome. `password_set` is true when an existing account
/// without a password received one instead of a new account being created.
#[derive(Debug, Clone)]
pub struct Registered {
    pub session: SessionPayload,
    pub password_set: bool,
}

#[derive(Debug, Clone)]
struct Session {
    user_id: String,
    expires_at: DateTime<Utc>,
}

/// Password accounts and bearer sessions on top of the store.
pub struct AuthService {
    store: Arc<MemoryStore>,
    ttl: Duration,
    sessions: Mutex<HashMap<String, Session>>,
}

impl AuthService {
    pub fn new(store: Arc<MemoryStore>, ttl_hours: u32) -> Self {
        Self {
            store,
            ttl: Duration::hours(i64::from(ttl_hours)),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, registration: Registration) -> Result<Registered, AuthError> {
        self.register_at(registration, Utc::now())
    }

    pub fn register_at(
        &self,
        registration: Registration,
        now: DateTime<Utc>,
    ) -> Result<Registered, AuthError> {
        let Registration {
            email,
            name,
            device_id,
            password,
        } = registration;
        let email = email.trim().to_lowercase();
        if [&email, &name, &device_id, &password]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(AuthError::MissingFields);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        if let Some(existing) = self.store.user_by_email(&email) {
            if existing.password_hash.is_some() {
                return Err(AuthError::DuplicateEmail);
            }
            let salt = new_salt();
            let hash = hash_password(&salt, &password);
            let updated = self.store.update_user(&existing.user.id, |record| {
                record.salt = salt;
                record.password_hash = Some(hash);
                record.user.last_active = Some(now);
            })?;
            log::info!("password set for existing account {}", updated.user.email);
            let session = self.open_session(updated.user, now);
            return Ok(Registered {
                session,
                password_set: true,
            });
        }

        if self.store.user_by_device(&device_id).is_some() {
            return Err(AuthError::DuplicateDevice);
        }

        let salt = new_salt();
        let password_hash = Some(hash_password(&salt, &password));
        let mut user = User::new(email, name.trim(), device_id.trim());
        user.last_active = Some(now);
        let record = self.store.insert_user(UserRecord {
            user,
            password_hash,
            salt,
        });
        log::info!("registered {} ({})", record.user.email, record.user.id);
        let session = self.open_session(record.user, now);
        Ok(Registered {
            session,
            password_set: false,
        })
    }

    pub fn login(&self, email: &str, password: &str) -> Result<SessionPayload, AuthError> {
        self.login_at(email, password, Utc::now())
    }

    pub fn login_at(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionPayload, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::MissingFields);
        }
        let record = self
            .store
            .user_by_email(email.trim())
            .ok_or(AuthError::UserNotFound)?;
        let stored = record
            .password_hash
            .as_deref()
            .ok_or(AuthError::PasswordNotSet)?;
        if hash_password(&record.salt, password) != stored {
            log::warn!("rejected login for {}", record.user.email);
            return Err(AuthError::InvalidCredentials);
        }
        if !record.user.is_active {
            return Err(AuthError::Deactivated);
        }
        let updated = self.store.update_user(&record.user.id, |record| {
            record.user.last_active = Some(now);
        })?;
        Ok(self.open_session(updated.user, now))
    }

    /// Whether an account exists for `email` and has a password.
    pub fn check_user(&self, email: &str) -> (bool, bool) {
        match self.store.user_by_email(email.trim()) {
            Some(record) => (true, record.password_hash.is_some()),
            None => (false, false),
        }
    }

    pub fn verify_token(&self, token: &str) -> Result<User, AuthError> {
        self.verify_token_at(token, Utc::now())
    }

    pub fn verify_token_at(&self, token: &str, now: DateTime<Utc>) -> Result<User, AuthError> {
        let user_id = {
            let mut sessions = self.sessions();
            let session = sessions
                .get(token)
                .cloned()
                .ok_or(AuthError::Unauthenticated)?;
            if session.expires_at <= now {
                sessions.remove(token);
                return Err(AuthError::Unauthenticated);
            }
            session.user_id
        };
        let record = self
            .store
            .user_by_id(&user_id)
            .ok_or(AuthError::Unauthenticated)?;
        if !record.user.is_active {
            return Err(AuthError::Deactivated);
        }
        Ok(record.user)
    }

    /// Drops the session. Returns whether it existed.
    pub fn logout(&self, token: &str) -> bool {
        self.sessions().remove(token).is_some()
    }

    fn open_session(&self, user: User, now: DateTime<Utc>) -> SessionPayload {
        let token = new_token();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|_, session| session.expires_at > now);
        if sessions.len() < before {
            log::debug!("pruned {} expired sessions", before - sessions.len());
        }
        sessions.insert(
            token.clone(),
            Session {
                user_id: user.id.clone(),
                expires_at,
            },
        );
        SessionPayload { token, user }
    }
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

fn new_salt() -> String {
    random_hex(16)
}

fn new_token() -> String {
    random_hex(32)
}

pub(crate) fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}
