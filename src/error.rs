//! Error types for album tree operations.

/// Errors returned by structural operations on the album trees.
///
/// Every variant is detected before the tree is touched, except
/// `BackingStoreFailure`, which is raised after the in-memory change has
/// been rolled back.
#[derive(Debug, thiserror::Error)]
pub enum AlbumError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Another album named '{0}' already exists here")]
    DuplicateName(String),

    #[error("Album not found: {0}")]
    NotFound(String),

    #[error("Backing store failure: {0:#}")]
    BackingStoreFailure(anyhow::Error),
}

impl AlbumError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        AlbumError::InvalidArgument(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        AlbumError::NotFound(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AlbumError>;
