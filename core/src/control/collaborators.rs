use crate::model::{GeoPoint, User};
use async_trait::async_trait;

/// Failures reported by the storage and authentication collaborators.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("not authenticated")]
    Unauthenticated,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Identifies who is looking at the dashboard.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn current_user(&self) -> Option<User>;
}

/// Read-only access to reported locations.
#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Points of `owner_email` from the last `hours` hours, bounded by the
    /// store's own limit. Order is unspecified.
    async fn recent_locations(
        &self,
        hours: u32,
        owner_email: &str,
    ) -> Result<Vec<GeoPoint>, CollaboratorError>;

    async fn latest_location(
        &self,
        owner_email: &str,
    ) -> Result<Option<GeoPoint>, CollaboratorError>;

    async fn active_users(&self) -> Result<Vec<User>, CollaboratorError>;
}
