use crate::service::auth::{AuthError, AuthService, Registration};
use crate::store::StoreError;
use chrono::Utc;
use geotrackcore::model::{ApiResponse, GeoPoint, LocationReport, User};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use warp::{http::StatusCode, Filter, Rejection, Reply};

#[derive(Debug)]
struct ApiRejection {
    status: StatusCode,
    message: String,
}

impl warp::reject::Reject for ApiRejection {}

fn reject(status: StatusCode, message: impl ToString) -> Rejection {
    warp::reject::custom(ApiRejection {
        status,
        message: message.to_string(),
    })
}

fn reject_auth(err: AuthError) -> Rejection {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    reject(status, err)
}

fn reject_store(err: StoreError) -> Rejection {
    match err {
        StoreError::InvalidCoordinates { .. } => reject(StatusCode::BAD_REQUEST, err),
        StoreError::UnknownUser(_) => reject(StatusCode::NOT_FOUND, err),
    }
}

fn json_reply<T: Serialize>(body: &ApiResponse<T>, status: StatusCode) -> warp::reply::Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

#[derive(Debug, Deserialize)]
struct Credentials {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
struct EmailQuery {
    #[serde(default)]
    email: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserCheck {
    pub exists: bool,
    pub has_password: bool,
}

#[derive(Debug, Deserialize)]
struct WindowQuery {
    hours: Option<u32>,
}

fn with_auth(
    auth: Arc<AuthService>,
) -> impl Filter<Extract = (Arc<AuthService>,), Error = Infallible> + Clone {
    warp::any().map(move || auth.clone())
}

fn bearer_token() -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(
        |header: Option<String>| async move {
            header
                .as_deref()
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .ok_or_else(|| reject_auth(AuthError::Unauthenticated))
        },
    )
}

fn authenticated(
    auth: Arc<AuthService>,
) -> impl Filter<Extract = (User,), Error = Rejection> + Clone {
    bearer_token().and(with_auth(auth)).and_then(
        |token: String, auth: Arc<AuthService>| async move {
            auth.verify_token(&token).map_err(reject_auth)
        },
    )
}

/// Every `/api` endpoint, ready for `warp::serve` once combined with the
/// rejection handler.
pub fn api_routes(
    auth: Arc<AuthService>,
) -> impl Filter<Extract = (warp::reply::Response,), Error = Rejection> + Clone {
    let register = warp::path!("api" / "auth" / "register")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_auth(auth.clone()))
        .and_then(|body: Registration, auth: Arc<AuthService>| async move {
            let registered = auth.register(body).map_err(reject_auth)?;
            let message = if registered.password_set {
                "Password set for existing account"
            } else {
                "Account created"
            };
            Ok::<_, Rejection>(json_reply(
                &ApiResponse::ok(registered.session).with_message(message),
                StatusCode::CREATED,
            ))
        });

    let login = warp::path!("api" / "auth" / "login")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_auth(auth.clone()))
        .and_then(|body: Credentials, auth: Arc<AuthService>| async move {
            let session = auth
                .login(&body.email, &body.password)
                .map_err(reject_auth)?;
            Ok::<_, Rejection>(json_reply(&ApiResponse::ok(session), StatusCode::OK))
        });

    let check = warp::path!("api" / "auth" / "check")
        .and(warp::get())
        .and(warp::query::<EmailQuery>())
        .and(with_auth(auth.clone()))
        .map(|query: EmailQuery, auth: Arc<AuthService>| {
            let (exists, has_password) = auth.check_user(&query.email);
            json_reply(
                &ApiResponse::ok(UserCheck {
                    exists,
                    has_password,
                }),
                StatusCode::OK,
            )
        });

    let me = warp::path!("api" / "auth" / "me")
        .and(warp::get())
        .and(authenticated(auth.clone()))
        .map(|user: User| json_reply(&ApiResponse::ok(user), StatusCode::OK));

    let logout = warp::path!("api" / "auth" / "logout")
        .and(warp::post())
        .and(bearer_token())
        .and(with_auth(auth.clone()))
        .map(|token: String, auth: Arc<AuthService>| {
            let revoked = auth.logout(&token);
            json_reply(
                &ApiResponse::ok(revoked).with_message("Logged out"),
                StatusCode::OK,
            )
        });

    let report = warp::path!("api" / "locations")
        .and(warp::post())
        .and(authenticated(auth.clone()))
        .and(warp::body::json())
        .and(with_auth(auth.clone()))
        .and_then(
            |user: User, body: LocationReport, auth: Arc<AuthService>| async move {
                let point = body.into_point(&user.email, &user.device_id, Utc::now());
                auth.store()
                    .record_location(point.clone())
                    .map_err(reject_store)?;
                log::debug!(
                    "stored location for {} on {} ({:.5}, {:.5})",
                    point.email,
                    point.device_id,
                    point.lat,
                    point.lng
                );
                Ok::<_, Rejection>(json_reply(&ApiResponse::ok(point), StatusCode::CREATED))
            },
        );

    let recent = warp::path!("api" / "locations" / "recent")
        .and(warp::get())
        .and(authenticated(auth.clone()))
        .and(warp::query::<WindowQuery>())
        .and(with_auth(auth.clone()))
        .map(|user: User, query: WindowQuery, auth: Arc<AuthService>| {
            let points = auth
                .store()
                .recent_for(&user.email, query.hours.unwrap_or(24), Utc::now());
            json_reply(&ApiResponse::ok(points), StatusCode::OK)
        });

    let latest = warp::path!("api" / "locations" / "latest")
        .and(warp::get())
        .and(authenticated(auth.clone()))
        .and(with_auth(auth.clone()))
        .map(|user: User, auth: Arc<AuthService>| {
            let body = match auth.store().latest_for(&user.email) {
                Some(point) => ApiResponse::ok(point),
                None => ApiResponse::<GeoPoint> {
                    success: true,
                    data: None,
                    message: Some("No locations recorded".into()),
                    error: None,
                },
            };
            json_reply(&body, StatusCode::OK)
        });

    let all = warp::path!("api" / "locations" / "all")
        .and(warp::get())
        .and(authenticated(auth.clone()))
        .and(with_auth(auth.clone()))
        .map(|_user: User, auth: Arc<AuthService>| {
            json_reply(
                &ApiResponse::ok(auth.store().all_recent(Utc::now())),
                StatusCode::OK,
            )
        });

    let active = warp::path!("api" / "users" / "active")
        .and(warp::get())
        .and(authenticated(auth.clone()))
        .and(with_auth(auth))
        .map(|_user: User, auth: Arc<AuthService>| {
            json_reply(
                &ApiResponse::ok(auth.store().active_users()),
                StatusCode::OK,
            )
        });

    register
        .or(login)
        .unify()
        .or(check)
        .unify()
        .or(me)
        .unify()
        .or(logout)
        .unify()
        .or(report)
        .unify()
        .or(recent)
        .unify()
        .or(latest)
        .unify()
        .or(all)
        .unify()
        .or(active)
        .unify()
}

/// Turns every rejection into the JSON failure envelope.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(api) = err.find::<ApiRejection>() {
        (api.status, api.message.clone())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(body) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("malformed body: {}", body))
    } else if let Some(query) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, query.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "method not allowed".to_string(),
        )
    } else {
        log::error!("unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal error".to_string(),
        )
    };
    Ok(json_reply(&ApiResponse::<()>::failure(message), status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreLimits};
    use geotrackcore::model::SessionPayload;
    use serde::de::DeserializeOwned;
    use serde_json::json;

    fn service() -> Arc<AuthService> {
        Arc::new(AuthService::new(
            Arc::new(MemoryStore::new(StoreLimits::default())),
            168,
        ))
    }

    fn body<T: DeserializeOwned>(bytes: &[u8]) -> ApiResponse<T> {
        serde_json::from_slice(bytes).unwrap()
    }

    async fn register(auth: &Arc<AuthService>) -> SessionPayload {
        let filter = api_routes(auth.clone()).recover(handle_rejection);
        let response = warp::test::request()
            .method("POST")
            .path("/api/auth/register")
            .json(&json!({
                "email": "ana@example.com",
                "name": "Ana",
                "deviceId": "ana-phone",
                "password": "secret1"
            }))
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body::<SessionPayload>(response.body()).data.unwrap()
    }

    #[tokio::test]
    async fn report_then_read_back_latest() {
        let auth = service();
        let session = register(&auth).await;
        let filter = api_routes(auth.clone()).recover(handle_rejection);
        let bearer = format!("Bearer {}", session.token);

        let response = warp::test::request()
            .method("POST")
            .path("/api/locations")
            .header("authorization", &bearer)
            .json(&json!({"lat": 9.93, "lng": -84.09, "accuracy": 5.0}))
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let stored = body::<GeoPoint>(response.body()).data.unwrap();
        assert_eq!(stored.device_id, "ana-phone");

        let response = warp::test::request()
            .path("/api/locations/latest")
            .header("authorization", &bearer)
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let latest = body::<GeoPoint>(response.body()).data.unwrap();
        assert_eq!(latest.lat, 9.93);

        let response = warp::test::request()
            .path("/api/locations/recent?hours=1")
            .header("authorization", &bearer)
            .reply(&filter)
            .await;
        assert_eq!(body::<Vec<GeoPoint>>(response.body()).data.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_report_is_rejected() {
        let auth = service();
        let session = register(&auth).await;
        let filter = api_routes(auth.clone()).recover(handle_rejection);
        let response = warp::test::request()
            .method("POST")
            .path("/api/locations")
            .header("authorization", format!("Bearer {}", session.token))
            .json(&json!({"lat": "north", "lng": -84.09}))
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!body::<()>(response.body()).success);
        assert_eq!(auth.store().location_count(), 0);
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        let filter = api_routes(service()).recover(handle_rejection);
        for path in ["/api/auth/me", "/api/locations/all", "/api/users/active"] {
            let response = warp::test::request().path(path).reply(&filter).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{path}");
        }
        let response = warp::test::request()
            .path("/api/auth/me")
            .header("authorization", "Bearer nope")
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_errors_and_logout() {
        let auth = service();
        let session = register(&auth).await;
        let filter = api_routes(auth.clone()).recover(handle_rejection);

        let response = warp::test::request()
            .method("POST")
            .path("/api/auth/login")
            .json(&json!({"email": "ana@example.com", "password": "wrong-one"}))
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body::<()>(response.body()).error.as_deref(),
            Some("invalid credentials")
        );

        let response = warp::test::request()
            .path("/api/auth/check?email=ana@example.com")
            .reply(&filter)
            .await;
        let check = body::<UserCheck>(response.body()).data.unwrap();
        assert!(check.exists && check.has_password);

        let response = warp::test::request()
            .method("POST")
            .path("/api/auth/logout")
            .header("authorization", format!("Bearer {}", session.token))
            .reply(&filter)
            .await;
        assert_eq!(body::<bool>(response.body()).data, Some(true));
        assert!(auth.verify_token(&session.token).is_err());
    }

    #[tokio::test]
    async fn unknown_path_uses_failure_envelope() {
        let filter = api_routes(service()).recover(handle_rejection);
        let response = warp::test::request().path("/api/nothing").reply(&filter).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(!body::<()>(response.body()).success);
    }
}
