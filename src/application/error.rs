use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{
        accounts::AccountError, feed::FeedError, follow::FollowError, groups::GroupError,
        posts::PostError, repos::RepoError,
    },
    infra::error::InfraError,
    presentation::views,
};

/// Diagnostic attached to error responses and emitted by the response logger.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Handler failure rendered as an HTML error page.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn not_found(source: &'static str, detail: impl Into<String>) -> Self {
        Self::new(source, StatusCode::NOT_FOUND, "Page not found", detail)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = views::render_error_page(self.status, self.public_message);
        self.report.attach(&mut response);
        response
    }
}

impl From<RepoError> for HttpError {
    fn from(error: RepoError) -> Self {
        let status = match error {
            RepoError::Timeout | RepoError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        HttpError::from_error(
            "application::error::repo_error_to_http_error",
            status,
            "Service temporarily unavailable",
            &error,
        )
    }
}

impl From<FeedError> for HttpError {
    fn from(error: FeedError) -> Self {
        match error {
            FeedError::UnknownGroup { .. }
            | FeedError::UnknownAuthor { .. }
            | FeedError::UnknownPost { .. } => HttpError::from_error(
                "application::error::feed_error_to_http_error",
                StatusCode::NOT_FOUND,
                "Page not found",
                &error,
            ),
            FeedError::Repo(err) => err.into(),
        }
    }
}

impl From<FollowError> for HttpError {
    fn from(error: FollowError) -> Self {
        match error {
            FollowError::UnknownAuthor { .. } => HttpError::from_error(
                "application::error::follow_error_to_http_error",
                StatusCode::NOT_FOUND,
                "Page not found",
                &error,
            ),
            FollowError::Repo(err) => err.into(),
        }
    }
}

impl From<PostError> for HttpError {
    fn from(error: PostError) -> Self {
        match error {
            PostError::NotFound { .. } => HttpError::from_error(
                "application::error::post_error_to_http_error",
                StatusCode::NOT_FOUND,
                "Page not found",
                &error,
            ),
            PostError::NotAuthor { .. } => HttpError::from_error(
                "application::error::post_error_to_http_error",
                StatusCode::FORBIDDEN,
                "You cannot change this post",
                &error,
            ),
            PostError::Invalid(_) => HttpError::from_error(
                "application::error::post_error_to_http_error",
                StatusCode::BAD_REQUEST,
                "Request could not be processed",
                &error,
            ),
            PostError::Repo(err) => err.into(),
        }
    }
}

impl From<AccountError> for HttpError {
    fn from(error: AccountError) -> Self {
        match error {
            AccountError::Invalid(_) | AccountError::InvalidCredentials => HttpError::from_error(
                "application::error::account_error_to_http_error",
                StatusCode::BAD_REQUEST,
                "Request could not be processed",
                &error,
            ),
            AccountError::Hashing(_) => HttpError::from_error(
                "application::error::account_error_to_http_error",
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                &error,
            ),
            AccountError::Repo(err) => err.into(),
        }
    }
}

/// Failure of a command-line run. `main` reports it and exits with [`AppError::exit_code`].
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Group(#[from] GroupError),
    #[error("{0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// `2` for input the operator can fix, `1` otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Validation(_)
            | AppError::Infra(InfraError::MissingDatabaseUrl)
            | AppError::Group(GroupError::Domain(_) | GroupError::DuplicateSlug { .. }) => 2,
            _ => 1,
        }
    }
}
