//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod cfmm2tar_output_repo;
pub mod datalad_dataset_repo;
pub mod dataset_archive_repo;
pub mod explicit_patient_repo;
pub mod globus_username_repo;
pub mod notification_repo;
pub mod principal_repo;
pub mod study_repo;
pub mod tar2bids_output_repo;
pub mod task_repo;
pub mod user_repo;

pub use cfmm2tar_output_repo::Cfmm2tarOutputRepo;
pub use datalad_dataset_repo::DataladDatasetRepo;
pub use dataset_archive_repo::DatasetArchiveRepo;
pub use explicit_patient_repo::ExplicitPatientRepo;
pub use globus_username_repo::GlobusUsernameRepo;
pub use notification_repo::NotificationRepo;
pub use principal_repo::PrincipalRepo;
pub use study_repo::StudyRepo;
pub use tar2bids_output_repo::Tar2bidsOutputRepo;
pub use task_repo::TaskRepo;
pub use user_repo::UserRepo;
