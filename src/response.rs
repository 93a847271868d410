use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

/// Uniform JSON body returned by every endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T = Value> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Data<T>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
    pub status_code: u16,
}

/// Wrapper so a success envelope always carries `data`, even when the
/// payload itself is `null`.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct Data<T>(pub T);

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(Data(data)),
            errors: None,
            status_code: status.as_u16(),
        }
    }

    pub fn ok(data: T) -> Self {
        Self::success(data, "Success", StatusCode::OK)
    }
}

impl ApiResponse<Value> {
    pub fn error(message: impl Into<String>, status: StatusCode, errors: Option<Value>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            errors,
            status_code: status.as_u16(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::success(
            json!({"id": 1}),
            "User created successfully",
            StatusCode::CREATED,
        ))
        .unwrap();
        assert_eq!(
            body,
            json!({
                "success": true,
                "message": "User created successfully",
                "data": {"id": 1},
                "statusCode": 201
            })
        );
    }

    #[test]
    fn success_with_unit_data_serializes_null() {
        let body = serde_json::to_value(ApiResponse::success(
            (),
            "User deleted successfully",
            StatusCode::OK,
        ))
        .unwrap();
        assert!(body.get("data").is_some());
        assert!(body["data"].is_null());
        assert!(body.get("errors").is_none());
    }

    #[test]
    fn ok_uses_defaults() {
        let resp = ApiResponse::ok(vec![1, 2, 3]);
        assert_eq!(resp.message, "Success");
        assert_eq!(resp.status_code, 200);
        assert!(resp.success);
    }

    #[test]
    fn error_envelope_omits_absent_errors() {
        let body = serde_json::to_value(ApiResponse::error(
            "User not found",
            StatusCode::NOT_FOUND,
            None,
        ))
        .unwrap();
        assert_eq!(
            body,
            json!({"success": false, "message": "User not found", "statusCode": 404})
        );
    }

    #[test]
    fn into_response_mirrors_status() {
        let resp = ApiResponse::error("boom", StatusCode::BAD_REQUEST, Some(json!({"email": "bad"})))
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
