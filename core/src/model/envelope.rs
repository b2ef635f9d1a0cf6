use crate::model::User;
use serde::{Deserialize, Serialize};

/// JSON envelope used by every service endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: serde::de::DeserializeOwned"))]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn failure(error: impl ToString) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(error.to_string()),
        }
    }

    /// Payload of a successful response, or the reported error text.
    pub fn into_result(self) -> Result<Option<T>, String> {
        if self.success {
            Ok(self.data)
        } else {
            Err(self
                .error
                .unwrap_or_else(|| "request failed without an error message".into()))
        }
    }
}

/// Issued on successful login or registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPayload {
    pub token: String,
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GeoPoint;

    #[test]
    fn failure_envelope_omits_data() {
        let encoded = serde_json::to_string(&ApiResponse::<u32>::failure("Not authenticated")).unwrap();
        assert_eq!(encoded, r#"{"success":false,"error":"Not authenticated"}"#);
    }

    #[test]
    fn into_result_distinguishes_success_and_failure() {
        let ok: ApiResponse<u32> = serde_json::from_str(r#"{"success":true,"data":7}"#).unwrap();
        assert_eq!(ok.into_result(), Ok(Some(7)));
        let empty: ApiResponse<u32> = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert_eq!(empty.into_result(), Ok(None));
        let failed: ApiResponse<u32> =
            serde_json::from_str(r#"{"success":false,"error":"down"}"#).unwrap();
        assert_eq!(failed.into_result(), Err("down".to_string()));
    }

    #[test]
    fn decodes_point_and_session_payloads() {
        let point: ApiResponse<GeoPoint> = serde_json::from_str(
            r#"{"success":true,"data":{"email":"ana@example.com","deviceId":"phone-1","lat":9.93,"lng":-84.09,"timestamp":"2024-05-01T12:00:00Z"}}"#,
        )
        .unwrap();
        let point = point.into_result().unwrap().unwrap();
        assert_eq!(point.device_id, "phone-1");
        assert_eq!(point.lat, 9.93);

        let missing: ApiResponse<GeoPoint> =
            serde_json::from_str(r#"{"success":true,"message":"No location"}"#).unwrap();
        assert_eq!(missing.into_result(), Ok(None));

        let session: ApiResponse<SessionPayload> = serde_json::from_str(
            r#"{"success":true,"data":{"token":"abc","user":{"email":"ana@example.com","name":"Ana","deviceId":"phone-1"}}}"#,
        )
        .unwrap();
        let session = session.into_result().unwrap().unwrap();
        assert_eq!(session.token, "abc");
        assert_eq!(session.user, User::new("ana@example.com", "Ana", "phone-1"));

        let users: ApiResponse<Vec<User>> =
            serde_json::from_str(r#"{"success":true,"data":[]}"#).unwrap();
        assert_eq!(users.into_result(), Ok(Some(Vec::new())));
    }
}
