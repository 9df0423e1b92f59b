use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Only the team captain may perform this action")]
    NotCaptain,

    #[error("Team name is already in use")]
    NameTaken,

    #[error("Team tag is already in use")]
    TagTaken,

    #[error("User is already a member of this team")]
    AlreadyMember,

    #[error("Team roster is full")]
    TeamFull,

    #[error("Invitation is invalid or already used")]
    InvalidToken,

    #[error("Invitation has expired")]
    Expired,

    #[error("This invitation was issued to another user")]
    NotYourInvitation,

    #[error("The captain cannot be removed from the team")]
    CaptainCannotBeRemoved,

    #[error("The captain must name a new captain or disband the team")]
    CaptainMustTransferOrDisband,
}

/// Coarse error categories for the request-handling layer to translate
/// into transport-level statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    Conflict,
    InvalidToken,
    Expired,
    InvariantViolation,
    NotYourInvitation,
    Validation,
    Internal,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::DatabaseError(_) => ErrorKind::Internal,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::NotCaptain => ErrorKind::Unauthorized,
            AppError::NameTaken
            | AppError::TagTaken
            | AppError::AlreadyMember
            | AppError::TeamFull => ErrorKind::Conflict,
            AppError::InvalidToken => ErrorKind::InvalidToken,
            AppError::Expired => ErrorKind::Expired,
            AppError::NotYourInvitation => ErrorKind::NotYourInvitation,
            AppError::CaptainCannotBeRemoved | AppError::CaptainMustTransferOrDisband => {
                ErrorKind::InvariantViolation
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        log::error!("Database error: {}", error);
        AppError::DatabaseError(error)
    }
}

/// True when the driver reports a unique-index violation, used to map a
/// racing insert onto the domain conflict it represents.
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}
