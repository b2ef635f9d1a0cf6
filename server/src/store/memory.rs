use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use geotrackcore::control::{CollaboratorError, LocationStore};
use geotrackcore::model::{GeoPoint, User};
use serde::{Deserialize, Serialize};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Result caps applied by the query methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreLimits {
    /// Cap for one user's recent window.
    pub recent: usize,
    /// Cap for the all-users 24 h listing.
    pub all: usize,
    /// Cap for the all-users listing when the last 24 h are empty.
    pub fallback: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            recent: 500,
            all: 1000,
            fallback: 100,
        }
    }
}

/// Stored account with its credential material.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub user: User,
    pub password_hash: Option<String>,
    pub salt: String,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("coordinates ({lat}, {lng}) are not a valid position")]
    InvalidCoordinates { lat: f64, lng: f64 },
    #[error("no user with id {0}")]
    UnknownUser(String),
}

#[derive(Default)]
struct StoreState {
    next_user_id: u64,
    users: Vec<UserRecord>,
    locations: Vec<GeoPoint>,
}

/// Process-local user and location storage.
pub struct MemoryStore {
    limits: StoreLimits,
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new(limits: StoreLimits) -> Self {
        Self {
            limits,
            state: RwLock::new(StoreState::default()),
        }
    }

    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores a new account and returns it with its assigned id.
    pub fn insert_user(&self, mut record: UserRecord) -> UserRecord {
        let mut state = self.write();
        state.next_user_id += 1;
        record.user.id = format!("u{:04}", state.next_user_id);
        state.users.push(record.clone());
        record
    }

    pub fn user_by_email(&self, email: &str) -> Option<UserRecord> {
        self.read()
            .users
            .iter()
            .find(|record| record.user.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    pub fn user_by_device(&self, device_id: &str) -> Option<UserRecord> {
        self.read()
            .users
            .iter()
            .find(|record| record.user.device_id == device_id)
            .cloned()
    }

    pub fn user_by_id(&self, id: &str) -> Option<UserRecord> {
        self.read()
            .users
            .iter()
            .find(|record| record.user.id == id)
            .cloned()
    }

    /// Applies `change` to the stored account and returns the updated copy.
    pub fn update_user<F>(&self, id: &str, change: F) -> Result<UserRecord, StoreError>
    where
        F: FnOnce(&mut UserRecord),
    {
        let mut state = self.write();
        let record = state
            .users
            .iter_mut()
            .find(|record| record.user.id == id)
            .ok_or_else(|| StoreError::UnknownUser(id.to_string()))?;
        change(record);
        Ok(record.clone())
    }

    pub fn record_location(&self, point: GeoPoint) -> Result<(), StoreError> {
        if !point.is_valid() {
            return Err(StoreError::InvalidCoordinates {
                lat: point.lat,
                lng: point.lng,
            });
        }
        self.write().locations.push(point);
        Ok(())
    }

    pub fn location_count(&self) -> usize {
        self.read().locations.len()
    }

    /// Points of `email` newer than `hours` before `now`, newest first.
    pub fn recent_for(&self, email: &str, hours: u32, now: DateTime<Utc>) -> Vec<GeoPoint> {
        let since = now
            .checked_sub_signed(Duration::hours(i64::from(hours)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let state = self.read();
        let mut points: Vec<GeoPoint> = state
            .locations
            .iter()
            .filter(|point| point.email.eq_ignore_ascii_case(email) && point.timestamp >= since)
            .cloned()
            .collect();
        newest_first(&mut points, self.limits.recent);
        points
    }

    pub fn latest_for(&self, email: &str) -> Option<GeoPoint> {
        self.read()
            .locations
            .iter()
            .filter(|point| point.email.eq_ignore_ascii_case(email))
            .max_by_key(|point| point.timestamp)
            .cloned()
    }

    /// Every user's points from the last 24 hours, newest first. When that
    /// window is empty the most recent points of any age are returned instead.
    pub fn all_recent(&self, now: DateTime<Utc>) -> Vec<GeoPoint> {
        let since = now - Duration::hours(24);
        let state = self.read();
        let mut points: Vec<GeoPoint> = state
            .locations
            .iter()
            .filter(|point| point.timestamp >= since)
            .cloned()
            .collect();
        if points.is_empty() {
            log::warn!("no locations in the last 24 hours, falling back to the most recent");
            points = state.locations.clone();
            newest_first(&mut points, self.limits.fallback);
        } else {
            newest_first(&mut points, self.limits.all);
        }
        points
    }

    /// Active accounts, most recently active first.
    pub fn active_users(&self) -> Vec<User> {
        let mut users: Vec<User> = self
            .read()
            .users
            .iter()
            .filter(|record| record.user.is_active)
            .map(|record| record.user.clone())
            .collect();
        users.sort_by(|a, b| b.last_active.cmp(&a.last_active));
        users
    }
}

fn newest_first(points: &mut Vec<GeoPoint>, limit: usize) {
    points.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    points.truncate(limit);
}

#[async_trait]
impl LocationStore for MemoryStore {
    async fn recent_locations(
        &self,
        hours: u32,
        owner_email: &str,
    ) -> Result<Vec<GeoPoint>, CollaboratorError> {
        Ok(self.recent_for(owner_email, hours, Utc::now()))
    }

    async fn latest_location(
        &self,
        owner_email: &str,
    ) -> Result<Option<GeoPoint>, CollaboratorError> {
        Ok(self.latest_for(owner_email))
    }

    async fn active_users(&self) -> Result<Vec<User>, CollaboratorError> {
        Ok(MemoryStore::active_users(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap()
    }

    fn point(email: &str, hours_ago: i64) -> GeoPoint {
        GeoPoint::new(email, "phone-1", 9.93, -84.09, now() - Duration::hours(hours_ago))
    }

    fn account(email: &str, last_active_hours_ago: Option<i64>) -> UserRecord {
        let mut user = User::new(email, "Test", format!("{email}-device"));
        user.last_active = last_active_hours_ago.map(|hours| now() - Duration::hours(hours));
        UserRecord {
            user,
            password_hash: None,
            salt: String::new(),
        }
    }

    #[test]
    fn recent_window_is_scoped_sorted_and_limited() {
        let store = MemoryStore::new(StoreLimits {
            recent: 2,
            ..Default::default()
        });
        for hours in [1, 30, 3, 2] {
            store.record_location(point("ana@example.com", hours)).unwrap();
        }
        store.record_location(point("leo@example.com", 1)).unwrap();

        let recent = store.recent_for("ana@example.com", 24, now());
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].timestamp, now() - Duration::hours(1));
        assert_eq!(recent[1].timestamp, now() - Duration::hours(2));
    }

    #[test]
    fn oversized_window_covers_all_history() {
        let store = MemoryStore::new(StoreLimits::default());
        store.record_location(point("ana@example.com", 1)).unwrap();
        store.record_location(point("ana@example.com", 24 * 365 * 50)).unwrap();
        assert_eq!(store.recent_for("ana@example.com", u32::MAX, now()).len(), 2);
    }

    #[test]
    fn rejects_invalid_coordinates() {
        let store = MemoryStore::new(StoreLimits::default());
        let mut broken = point("ana@example.com", 1);
        broken.lat = f64::NAN;
        assert!(matches!(
            store.record_location(broken),
            Err(StoreError::InvalidCoordinates { .. })
        ));
        assert_eq!(store.location_count(), 0);
    }

    #[test]
    fn all_recent_falls_back_to_latest_points() {
        let store = MemoryStore::new(StoreLimits {
            fallback: 2,
            ..Default::default()
        });
        for hours in [48, 72, 50] {
            store.record_location(point("ana@example.com", hours)).unwrap();
        }
        let points = store.all_recent(now());
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp, now() - Duration::hours(48));
    }

    #[test]
    fn active_users_sorted_by_last_activity() {
        let store = MemoryStore::new(StoreLimits::default());
        store.insert_user(account("old@example.com", Some(10)));
        store.insert_user(account("new@example.com", Some(1)));
        let inactive = store.insert_user(account("gone@example.com", Some(0)));
        store
            .update_user(&inactive.user.id, |record| record.user.is_active = false)
            .unwrap();

        let users = store.active_users();
        let emails: Vec<&str> = users.iter().map(|user| user.email.as_str()).collect();
        assert_eq!(emails, vec!["new@example.com", "old@example.com"]);
    }

    #[tokio::test]
    async fn latest_location_through_collaborator_trait() {
        let store = MemoryStore::new(StoreLimits::default());
        store.record_location(point("ana@example.com", 5)).unwrap();
        store.record_location(point("ana@example.com", 2)).unwrap();
        let latest = LocationStore::latest_location(&store, "ana@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.timestamp, now() - Duration::hours(2));
        assert!(LocationStore::latest_location(&store, "leo@example.com")
            .await
            .unwrap()
            .is_none());
    }
}
