use application::ApplicationError;
use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

fn status_of(error: &ApplicationError) -> StatusCode {
    use ApplicationError as AppErr;

    match error {
        AppErr::Domain(_) => StatusCode::BAD_REQUEST,
        AppErr::DuplicateHandle | AppErr::DuplicateEmail | AppErr::InvalidCode => {
            StatusCode::BAD_REQUEST
        }
        AppErr::Unauthenticated | AppErr::InvalidToken(_) | AppErr::InvalidCredentials => {
            StatusCode::UNAUTHORIZED
        }
        AppErr::NotFound | AppErr::RoomNotFound(_) => StatusCode::NOT_FOUND,
        AppErr::CodeCollision { .. }
        | AppErr::StoreUnavailable(_)
        | AppErr::Password(_)
        | AppErr::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        let status = status_of(&error);
        if error.is_server_fault() {
            // 5xx 只返回笼统描述，完整原因写日志
            error!(code = error.code(), error = %error, "请求处理失败");
            return ApiError::new(status, error.code(), "internal server error");
        }
        ApiError::new(status, error.code(), error.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
