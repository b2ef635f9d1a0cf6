use crate::control::collaborators::{Authenticator, CollaboratorError, LocationStore};
use crate::control::controller::{FetchKind, FetchRequest, FetchResult, FetchTicket};
use std::sync::Arc;

/// Runs a controller fetch against the collaborators.
///
/// The current user gates the query: without one the fetch fails with
/// [`CollaboratorError::Unauthenticated`]. A latest-point fetch with no point
/// yields an empty set.
pub async fn execute<A, L>(
    request: FetchRequest,
    auth: Arc<A>,
    store: Arc<L>,
) -> (FetchTicket, FetchResult)
where
    A: Authenticator + ?Sized,
    L: LocationStore + ?Sized,
{
    let result = run(request.kind, auth.as_ref(), store.as_ref()).await;
    (request.ticket, result)
}

async fn run<A, L>(kind: FetchKind, auth: &A, store: &L) -> FetchResult
where
    A: Authenticator + ?Sized,
    L: LocationStore + ?Sized,
{
    let user = auth
        .current_user()
        .await
        .ok_or(CollaboratorError::Unauthenticated)?;
    match kind {
        FetchKind::Latest => Ok(store
            .latest_location(&user.email)
            .await?
            .into_iter()
            .collect()),
        FetchKind::Window { hours } => store.recent_locations(hours, &user.email).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::controller::{CompletionStatus, ControllerConfig, ViewModeController};
    use crate::control::scheduler::CooperativeScheduler;
    use crate::model::{GeoPoint, User};
    use crate::prelude::ViewMode;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};

    struct FixedUser(Option<User>);

    #[async_trait]
    impl Authenticator for FixedUser {
        async fn current_user(&self) -> Option<User> {
            self.0.clone()
        }
    }

    struct FixtureStore {
        points: Vec<GeoPoint>,
        broken: bool,
    }

    #[async_trait]
    impl LocationStore for FixtureStore {
        async fn recent_locations(
            &self,
            _hours: u32,
            owner_email: &str,
        ) -> Result<Vec<GeoPoint>, CollaboratorError> {
            if self.broken {
                return Err(CollaboratorError::Unavailable("offline".into()));
            }
            Ok(self
                .points
                .iter()
                .filter(|point| point.email == owner_email)
                .cloned()
                .collect())
        }

        async fn latest_location(
            &self,
            owner_email: &str,
        ) -> Result<Option<GeoPoint>, CollaboratorError> {
            let points = self.recent_locations(24, owner_email).await?;
            Ok(points.into_iter().max_by_key(|point| point.timestamp))
        }

        async fn active_users(&self) -> Result<Vec<User>, CollaboratorError> {
            Ok(Vec::new())
        }
    }

    fn store(broken: bool) -> Arc<FixtureStore> {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Arc::new(FixtureStore {
            points: vec![
                GeoPoint::new("ana@example.com", "phone-1", 9.93, -84.09, base),
                GeoPoint::new(
                    "ana@example.com",
                    "phone-1",
                    9.94,
                    -84.08,
                    base + Duration::minutes(5),
                ),
                GeoPoint::new("leo@example.com", "phone-2", 10.0, -84.0, base),
            ],
            broken,
        })
    }

    fn ana() -> Arc<FixedUser> {
        Arc::new(FixedUser(Some(User::new("ana@example.com", "Ana", "phone-1"))))
    }

    #[tokio::test]
    async fn live_fetch_returns_single_latest_point() {
        let mut controller =
            ViewModeController::new(CooperativeScheduler::new(), ControllerConfig::default());
        let request = controller.set_mode(ViewMode::Live).unwrap();
        let (ticket, result) = execute(request, ana(), store(false)).await;
        assert_eq!(controller.complete(ticket, result), CompletionStatus::Applied);
        assert_eq!(controller.points().len(), 1);
        assert_eq!(controller.points()[0].lat, 9.94);
    }

    #[tokio::test]
    async fn window_fetch_is_scoped_to_current_user() {
        let mut controller =
            ViewModeController::new(CooperativeScheduler::new(), ControllerConfig::default());
        let request = controller.start().unwrap();
        let (ticket, result) = execute(request, ana(), store(false)).await;
        controller.complete(ticket, result);
        assert_eq!(controller.points().len(), 2);
        assert!(controller
            .points()
            .iter()
            .all(|point| point.email == "ana@example.com"));
    }

    #[tokio::test]
    async fn missing_user_or_store_failure_is_an_error_result() {
        let request = ViewModeController::new(CooperativeScheduler::new(), ControllerConfig::default())
            .start()
            .unwrap();
        let (_, anonymous) = execute(request, Arc::new(FixedUser(None)), store(false)).await;
        assert_eq!(anonymous, Err(CollaboratorError::Unauthenticated));

        let (_, offline) = execute(request, ana(), store(true)).await;
        assert!(matches!(offline, Err(CollaboratorError::Unavailable(_))));
    }
}
