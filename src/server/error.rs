//! Request-boundary errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::error::ExploreError;
use crate::tree::TreeError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Explore(#[from] ExploreError),

    #[error("Metrics encoding failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Explore(ExploreError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Explore(ExploreError::Tree(
                TreeError::NodeNotFound(_) | TreeError::ObjectNotFound(_),
            )) => StatusCode::NOT_FOUND,
            ApiError::Explore(ExploreError::Numerical(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TreeError> for ApiError {
    fn from(e: TreeError) -> Self {
        ApiError::Explore(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NumericalError;

    #[test]
    fn test_status_mapping() {
        let validation: ApiError = ExploreError::Validation("page".into()).into();
        assert_eq!(validation.status(), StatusCode::BAD_REQUEST);

        let missing: ApiError = TreeError::NodeNotFound(7).into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let numerical: ApiError = ExploreError::Numerical(NumericalError::EigenSolver).into();
        assert_eq!(numerical.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let cycle: ApiError = TreeError::Cycle { node: 1, target: 2 }.into();
        assert_eq!(cycle.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_failed_background_task_is_500() {
        let join_error = tokio::spawn(async { panic!("boom") }).await.unwrap_err();
        let failed: ApiError = ExploreError::from(join_error).into();
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
