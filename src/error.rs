use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unauthorized")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("there is already an active poll")]
    Conflict,

    #[error("poll is closed")]
    ClosedPoll,

    #[error("poll is already closed")]
    AlreadyClosed,

    #[error("{0}")]
    InvalidState(&'static str),

    #[error("{0}")]
    Validation(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Mailbox(#[from] actix::MailboxError),
}

impl Error {
    /// Stable machine readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Unauthorized => "unauthorized",
            Error::NotFound(_) => "not_found",
            Error::Conflict => "conflict",
            Error::ClosedPoll => "closed_poll",
            Error::AlreadyClosed => "already_closed",
            Error::InvalidState(_) => "invalid_state",
            Error::Validation(_) => "validation",
            Error::Database(_) | Error::Mailbox(_) => "internal",
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict | Error::ClosedPoll | Error::AlreadyClosed | Error::InvalidState(_) => {
                StatusCode::CONFLICT
            }
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Database(_) | Error::Mailbox(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            Error::Database(_) | Error::Mailbox(_) => {
                error!(error = %self, "Request failed with internal error");
                "internal server error".to_owned()
            }
            _ => self.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.kind().to_owned(),
            message,
        })
    }
}

/// True when `err` was raised by the named unique index or constraint
pub(crate) fn violates(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint() == Some(constraint),
        _ => false,
    }
}
