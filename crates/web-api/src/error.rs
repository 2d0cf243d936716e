use application::ApplicationError;
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use domain::{AccessDenied, DomainError, RepositoryError};
use serde::Serialize;

/// 被封禁用户统一跳转到的提示页
pub const BANNED_LOCATION: &str = "/banned";

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
    location: Option<&'static str>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
            location: None,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    /// 303 跳转到封禁提示页，不是错误页。
    pub fn banned() -> Self {
        Self {
            location: Some(BANNED_LOCATION),
            ..Self::new(StatusCode::SEE_OTHER, "BANNED", "account is banned")
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use application::ApplicationError as AppErr;

        match error {
            AppErr::Access(AccessDenied::Banned) => ApiError::banned(),
            AppErr::Access(AccessDenied::Unauthenticated) => {
                ApiError::unauthorized("authentication required")
            }
            AppErr::Access(AccessDenied::Forbidden { capability }) => ApiError::new(
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                format!("missing capability {capability}"),
            ),
            AppErr::Domain(DomainError::InvalidArgument { field, reason }) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_ARGUMENT",
                format!("{}: {}", field, reason),
            ),
            AppErr::Domain(DomainError::CategoryNotFound) => ApiError::new(
                StatusCode::NOT_FOUND,
                "CATEGORY_NOT_FOUND",
                "category not found",
            ),
            AppErr::Domain(DomainError::ThreadNotFound) => {
                ApiError::new(StatusCode::NOT_FOUND, "THREAD_NOT_FOUND", "thread not found")
            }
            AppErr::Domain(DomainError::ChatMessageNotFound) => ApiError::new(
                StatusCode::NOT_FOUND,
                "MESSAGE_NOT_FOUND",
                "chat message not found",
            ),
            AppErr::Domain(DomainError::UserNotFound) => {
                ApiError::new(StatusCode::NOT_FOUND, "USER_NOT_FOUND", "user not found")
            }
            AppErr::Domain(DomainError::UserAlreadyExists) => {
                ApiError::new(StatusCode::CONFLICT, "USER_EXISTS", "user already exists")
            }
            AppErr::Domain(DomainError::OperationNotAllowed) => ApiError::new(
                StatusCode::FORBIDDEN,
                "OPERATION_NOT_ALLOWED",
                "operation not allowed",
            ),
            AppErr::Repository(repo_err) => match repo_err {
                RepositoryError::NotFound => ApiError::new(
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    "requested resource not found",
                ),
                RepositoryError::Conflict => {
                    ApiError::new(StatusCode::CONFLICT, "CONFLICT", "resource already exists")
                }
                RepositoryError::Storage { message } => {
                    tracing::error!(error = %message, "storage failure");
                    ApiError::new(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "DATABASE_ERROR",
                        "database error",
                    )
                }
            },
            AppErr::Password(err) => {
                tracing::error!(error = %err, "password hashing failure");
                ApiError::internal_server_error("password processing failed")
            }
            AppErr::Authentication => ApiError::new(
                StatusCode::UNAUTHORIZED,
                "AUTHENTICATION_FAILED",
                "authentication failed",
            ),
            AppErr::Infrastructure(message) => {
                tracing::error!(error = %message, "infrastructure failure");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INFRASTRUCTURE_ERROR",
                    "internal error",
                )
            }
        }
    }
}

impl From<AccessDenied> for ApiError {
    fn from(denied: AccessDenied) -> Self {
        ApplicationError::from(denied).into()
    }
}

macro_rules! impl_from_rejection {
    ($($rejection:ty),*) => {
        $(
            impl From<$rejection> for ApiError {
                fn from(rejection: $rejection) -> Self {
                    ApiError::new(rejection.status(), "INVALID_REQUEST", rejection.body_text())
                }
            }
        )*
    };
}

impl_from_rejection!(JsonRejection, PathRejection, QueryRejection);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.location {
            Some(location) => {
                (self.status, [(header::LOCATION, location)], Json(self.body)).into_response()
            }
            None => (self.status, Json(self.body)).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Capability;

    #[test]
    fn access_outcomes_map_to_distinct_statuses() {
        let banned = ApiError::from(ApplicationError::Access(AccessDenied::Banned));
        assert_eq!(banned.status(), StatusCode::SEE_OTHER);

        let anonymous = ApiError::from(ApplicationError::Access(AccessDenied::Unauthenticated));
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let forbidden = ApiError::from(ApplicationError::Access(AccessDenied::Forbidden {
            capability: Capability::ModerateChat,
        }));
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn banned_response_redirects() {
        let response = ApiError::banned().into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            BANNED_LOCATION
        );
    }

    #[test]
    fn storage_details_are_not_leaked() {
        let err = ApiError::from(ApplicationError::Repository(RepositoryError::storage(
            "connection refused to 10.0.0.5",
        )));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body.message, "database error");
    }
}
