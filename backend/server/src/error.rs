use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ballot::payloads::Reply;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Option {0} not found")]
    OptionNotFound(i64),

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Database task failed: {0}")]
    Task(#[from] JoinError),
}

/// Outcomes of a vote attempt that did not commit. Exactly one applies.
#[derive(Error, Debug)]
pub enum VoteError {
    #[error("optionId inválido")]
    InvalidOption(i64),

    #[error("Este dispositivo/IP ya votó")]
    DuplicateVote,

    #[error("Error al registrar voto")]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("optionId inválido")]
    MalformedPayload,

    #[error(transparent)]
    Vote(#[from] VoteError),

    #[error("Error al obtener resultados")]
    Results(#[source] StorageError),

    #[error("Seeding failed: {0}")]
    SeedFailure(#[source] StorageError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedPayload => StatusCode::BAD_REQUEST,
            AppError::Vote(VoteError::InvalidOption(_)) => StatusCode::BAD_REQUEST,
            AppError::Vote(VoteError::DuplicateVote) => StatusCode::CONFLICT,
            AppError::Vote(VoteError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Results(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::SeedFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Vote(VoteError::Storage(source)) => {
                error!("Failed to register vote: {source}");
            }
            AppError::Results(source) => {
                error!("Failed to read results: {source}");
            }
            _ => {}
        }

        (self.status(), Json(Reply::rejected(self.to_string()))).into_response()
    }
}
