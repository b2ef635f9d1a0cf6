use async_trait::async_trait;
use geotrackcore::control::{Authenticator, CollaboratorError, LocationStore};
use geotrackcore::model::{ApiResponse, GeoPoint, SessionPayload, User};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::RwLock;

/// Talks to the GeoTrack service and holds the signed-in session.
pub struct HttpClient {
    base_url: String,
    http: reqwest::Client,
    session: RwLock<Option<SessionPayload>>,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            session: RwLock::new(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn token(&self) -> Option<String> {
        self.session
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(|session| session.token.clone())
    }

    fn store_session(&self, session: Option<SessionPayload>) {
        *self
            .session
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = session;
    }

    pub fn signed_in_user(&self) -> Option<User> {
        self.session
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(|session| session.user.clone())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, CollaboratorError> {
        let response = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(unavailable)?;
        let session: SessionPayload = decode(response)
            .await?
            .ok_or_else(|| CollaboratorError::Malformed("login returned no session".into()))?;
        let user = session.user.clone();
        self.store_session(Some(session));
        log::info!("signed in as {}", user.email);
        Ok(user)
    }

    /// Revokes the session on the server and forgets it locally. The local
    /// session is dropped even when the server cannot be reached.
    pub async fn logout(&self) -> Result<(), CollaboratorError> {
        let Some(token) = self.token() else {
            return Ok(());
        };
        self.store_session(None);
        let response = self
            .http
            .post(self.url("/api/auth/logout"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(unavailable)?;
        decode::<bool>(response).await.map(|_| ())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, CollaboratorError> {
        let token = self.token().ok_or(CollaboratorError::Unauthenticated)?;
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .map_err(unavailable)?;
        decode(response).await
    }
}

fn unavailable(err: reqwest::Error) -> CollaboratorError {
    CollaboratorError::Unavailable(err.to_string())
}

async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Option<T>, CollaboratorError> {
    let status = response.status();
    let body = response.text().await.map_err(unavailable)?;
    interpret(status, &body)
}

/// Maps an HTTP status and envelope body onto the collaborator result.
fn interpret<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
) -> Result<Option<T>, CollaboratorError> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(CollaboratorError::Unauthenticated);
    }
    let envelope: ApiResponse<T> = serde_json::from_str(body).map_err(|err| {
        if status.is_success() {
            CollaboratorError::Malformed(err.to_string())
        } else {
            CollaboratorError::Unavailable(format!("{status}"))
        }
    })?;
    envelope.into_result().map_err(|message| {
        if status.is_server_error() {
            CollaboratorError::Unavailable(message)
        } else {
            CollaboratorError::Rejected(message)
        }
    })
}

#[async_trait]
impl Authenticator for HttpClient {
    async fn current_user(&self) -> Option<User> {
        self.signed_in_user()
    }
}

#[async_trait]
impl LocationStore for HttpClient {
    async fn recent_locations(
        &self,
        hours: u32,
        _owner_email: &str,
    ) -> Result<Vec<GeoPoint>, CollaboratorError> {
        Ok(self
            .get(&format!("/api/locations/recent?hours={hours}"))
            .await?
            .unwrap_or_default())
    }

    async fn latest_location(
        &self,
        _owner_email: &str,
    ) -> Result<Option<GeoPoint>, CollaboratorError> {
        self.get("/api/locations/latest").await
    }

    async fn active_users(&self) -> Result<Vec<User>, CollaboratorError> {
        Ok(self.get("/api/users/active").await?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_payload_is_returned() {
        let body = r#"{"success":true,"data":[{"email":"ana@example.com","deviceId":"p","lat":9.9,"lng":-84.1,"timestamp":"2024-05-02T12:00:00Z"}]}"#;
        let points: Vec<GeoPoint> = interpret(StatusCode::OK, body).unwrap().unwrap();
        assert_eq!(points[0].device_id, "p");
    }

    #[test]
    fn missing_latest_point_is_none() {
        let body = r#"{"success":true,"message":"No locations recorded"}"#;
        let latest: Option<GeoPoint> = interpret(StatusCode::OK, body).unwrap();
        assert!(latest.is_none());
    }

    #[test]
    fn status_and_envelope_errors_are_classified() {
        let unauthorized = interpret::<User>(StatusCode::UNAUTHORIZED, "{}");
        assert_eq!(unauthorized, Err(CollaboratorError::Unauthenticated));

        let rejected = interpret::<User>(
            StatusCode::FORBIDDEN,
            r#"{"success":false,"error":"account is deactivated"}"#,
        );
        assert_eq!(
            rejected,
            Err(CollaboratorError::Rejected("account is deactivated".into()))
        );

        let broken = interpret::<User>(StatusCode::OK, "<html>");
        assert!(matches!(broken, Err(CollaboratorError::Malformed(_))));

        let gateway = interpret::<User>(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(gateway, Err(CollaboratorError::Unavailable(_))));
    }

    #[tokio::test]
    async fn queries_without_a_session_are_unauthenticated() {
        let client = HttpClient::new("http://127.0.0.1:9/");
        assert_eq!(client.base_url(), "http://127.0.0.1:9");
        assert!(client.current_user().await.is_none());
        assert_eq!(
            client.active_users().await,
            Err(CollaboratorError::Unauthenticated)
        );
        assert!(client.logout().await.is_ok());
    }
}
