use autobids_core::cfmm2tar::Cfmm2tarError;
use autobids_core::dicom::Dcm4cheError;
use autobids_core::process::CommandError;
use autobids_core::tar2bids::Tar2bidsError;
use autobids_core::types::DbId;

/// Errors raised while executing a background task.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Dicom(#[from] Dcm4cheError),

    #[error(transparent)]
    Cfmm2tar(#[from] Cfmm2tarError),

    #[error(transparent)]
    Tar2bids(#[from] Tar2bidsError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Invalid task parameters: {0}")]
    Parameters(#[from] serde_json::Error),

    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Configuration error: {0}")]
    Config(String),
}
