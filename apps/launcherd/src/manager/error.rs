use thiserror::Error;

use cdn_client::CdnError;
use launcher_core::proto::{ChannelError, ErrorCode};

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("{message}")]
    GuardConflict { message: String, process: String },

    #[error("You need to run the launcher as an administrator to continue.")]
    NotElevated,

    #[error("Could not retrieve release information: {0}")]
    SourceUnavailable(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Download cancelled before completion.")]
    DownloadCancelled,

    #[error("A download is already in progress.")]
    DownloadInProgress,

    #[error("{message}")]
    InstallFailed {
        message: String,
        code: Option<i32>,
    },

    #[error("{0}")]
    Settings(String),

    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Message(String),
}

impl ManagerError {
    pub fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

impl From<CdnError> for ManagerError {
    fn from(e: CdnError) -> Self {
        ManagerError::SourceUnavailable(e.to_string())
    }
}

/// Map internal errors -> stable wire errors.
/// Keep this mapping conservative and stable.
impl From<ManagerError> for ChannelError {
    fn from(e: ManagerError) -> Self {
        match e {
            ManagerError::GuardConflict { ref process, .. } => ChannelError {
                code: ErrorCode::GuardConflict,
                message: e.to_string(),
                details: [("process".into(), process.clone())].into_iter().collect(),
            },
            ManagerError::NotElevated => ChannelError {
                code: ErrorCode::NotElevated,
                message: e.to_string(),
                details: [("code".into(), "-1".into())].into_iter().collect(),
            },
            ManagerError::SourceUnavailable(_) => ChannelError {
                code: ErrorCode::SourceUnavailable,
                message: e.to_string(),
                details: Default::default(),
            },
            ManagerError::DownloadFailed(_) => ChannelError {
                code: ErrorCode::DownloadFailed,
                message: e.to_string(),
                details: Default::default(),
            },
            ManagerError::DownloadCancelled => ChannelError {
                code: ErrorCode::DownloadFailed,
                message: e.to_string(),
                details: [("cancelled".into(), "true".into())].into_iter().collect(),
            },
            ManagerError::DownloadInProgress => ChannelError {
                code: ErrorCode::DownloadInProgress,
                message: e.to_string(),
                details: Default::default(),
            },
            ManagerError::InstallFailed { code, .. } => ChannelError {
                code: ErrorCode::InstallFailed,
                message: e.to_string(),
                details: code
                    .map(|code| [("exit_code".into(), code.to_string())].into_iter().collect())
                    .unwrap_or_default(),
            },
            ManagerError::Io { context, .. } => ChannelError {
                code: ErrorCode::IoError,
                message: e.to_string(),
                details: [("context".into(), context.into())].into_iter().collect(),
            },
            ManagerError::Settings(_) | ManagerError::Message(_) => ChannelError {
                code: ErrorCode::Internal,
                message: e.to_string(),
                details: Default::default(),
            },
        }
    }
}
