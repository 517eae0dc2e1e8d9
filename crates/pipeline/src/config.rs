//! External tool configuration loaded from environment variables.

use std::path::PathBuf;

use crate::apptainer::ImageSpec;

/// Default DICOM server connect string (`AET@host:port`).
const DEFAULT_DICOM_SERVER_URL: &str = "0.0.0.0:11112";

/// Default scratch directory for tar2bids.
const DEFAULT_TAR2BIDS_TEMP_DIR: &str = "/tmp";

/// Default location of selectable tar2bids images.
const DEFAULT_TAR2BIDS_IMAGE_DIR: &str = "/etc/images";

/// Default tar2bids image file name.
const DEFAULT_TAR2BIDS_IMAGE: &str = "tar2bids.sif";

/// Default relative directory of heuristics inside the heuristic repo.
const DEFAULT_HEURISTIC_DIR_PATH: &str = "heuristics";

/// Default SSH port for the archive host.
const DEFAULT_ARCHIVE_SSH_PORT: u16 = 22;

/// Settings for every external tool the pipeline drives.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub dicom_server_url: String,
    pub dicom_server_username: String,
    pub dicom_server_password: String,
    pub dicom_server_tls: bool,
    /// Send `StudyInstanceUID=*` when no UIDs are requested.
    pub dicom_uid_wildcard: bool,
    /// PI names never offered on the request form.
    pub dicom_pi_blacklist: Vec<String>,
    /// Image providing findscu and cfmm2tar.
    pub cfmm2tar: ImageSpec,
    /// Default tar2bids image, used when a study has none selected.
    pub tar2bids: ImageSpec,
    pub cfmm2tar_download_dir: PathBuf,
    pub tar2bids_download_dir: PathBuf,
    pub tar2bids_temp_dir: PathBuf,
    pub tar2bids_image_dir: PathBuf,
    pub tar2bids_default_image: String,
    pub datalad_ria_url: String,
    /// `host:path` the archives are copied to.
    pub archive_base_url: String,
    pub archive_ssh_port: u16,
    pub archive_ssh_key: String,
    pub heuristic_git_url: String,
    pub heuristic_repo_path: PathBuf,
    /// Directory of heuristics relative to `heuristic_repo_path`.
    pub heuristic_dir_path: String,
}

impl ToolConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env var                                  | Default           |
    /// |------------------------------------------|-------------------|
    /// | `DICOM_SERVER_URL`                       | `0.0.0.0:11112`   |
    /// | `DICOM_SERVER_USERNAME`                  | empty             |
    /// | `DICOM_SERVER_PASSWORD`                  | empty             |
    /// | `DICOM_SERVER_TLS`                       | `true`            |
    /// | `DICOM_SERVER_STUDYINSTANCEUID_WILDCARD` | `false`           |
    /// | `DICOM_PI_BLACKLIST`                     | empty (comma list)|
    /// | `CFMM2TAR_PATH`, `CFMM2TAR_BINDS`        | no container      |
    /// | `TAR2BIDS_PATH`, `TAR2BIDS_BINDS`        | no container      |
    /// | `CFMM2TAR_DOWNLOAD_DIR`                  | system temp dir   |
    /// | `TAR2BIDS_DOWNLOAD_DIR`                  | system temp dir   |
    /// | `TAR2BIDS_TEMP_DIR`                      | `/tmp`            |
    /// | `TAR2BIDS_IMAGE_DIR`                     | `/etc/images`     |
    /// | `TAR2BIDS_DEFAULT_IMAGE`                 | `tar2bids.sif`    |
    /// | `DATALAD_RIA_URL`                        | empty             |
    /// | `ARCHIVE_BASE_URL`                       | empty             |
    /// | `ARCHIVE_SSH_PORT`                       | `22`              |
    /// | `ARCHIVE_SSH_KEY`                        | empty             |
    /// | `HEURISTIC_GIT_URL`                      | empty             |
    /// | `HEURISTIC_REPO_PATH`                    | system temp dir   |
    /// | `HEURISTIC_DIR_PATH`                     | `heuristics`      |
    pub fn from_env() -> Self {
        let temp = std::env::temp_dir();
        Self {
            dicom_server_url: env_or("DICOM_SERVER_URL", DEFAULT_DICOM_SERVER_URL),
            dicom_server_username: env_or("DICOM_SERVER_USERNAME", ""),
            dicom_server_password: env_or("DICOM_SERVER_PASSWORD", ""),
            dicom_server_tls: env_flag("DICOM_SERVER_TLS", true),
            dicom_uid_wildcard: env_flag("DICOM_SERVER_STUDYINSTANCEUID_WILDCARD", false),
            dicom_pi_blacklist: split_list(&env_or("DICOM_PI_BLACKLIST", "")),
            cfmm2tar: ImageSpec::new(
                env_or("CFMM2TAR_PATH", ""),
                split_list(&env_or("CFMM2TAR_BINDS", "")),
            ),
            tar2bids: ImageSpec::new(
                env_or("TAR2BIDS_PATH", ""),
                split_list(&env_or("TAR2BIDS_BINDS", "")),
            ),
            cfmm2tar_download_dir: env_path("CFMM2TAR_DOWNLOAD_DIR", &temp),
            tar2bids_download_dir: env_path("TAR2BIDS_DOWNLOAD_DIR", &temp),
            tar2bids_temp_dir: env_path(
                "TAR2BIDS_TEMP_DIR",
                &PathBuf::from(DEFAULT_TAR2BIDS_TEMP_DIR),
            ),
            tar2bids_image_dir: env_path(
                "TAR2BIDS_IMAGE_DIR",
                &PathBuf::from(DEFAULT_TAR2BIDS_IMAGE_DIR),
            ),
            tar2bids_default_image: env_or("TAR2BIDS_DEFAULT_IMAGE", DEFAULT_TAR2BIDS_IMAGE),
            datalad_ria_url: env_or("DATALAD_RIA_URL", ""),
            archive_base_url: env_or("ARCHIVE_BASE_URL", ""),
            archive_ssh_port: std::env::var("ARCHIVE_SSH_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_ARCHIVE_SSH_PORT),
            archive_ssh_key: env_or("ARCHIVE_SSH_KEY", ""),
            heuristic_git_url: env_or("HEURISTIC_GIT_URL", ""),
            heuristic_repo_path: env_path("HEURISTIC_REPO_PATH", &temp.join("heuristics")),
            heuristic_dir_path: env_or("HEURISTIC_DIR_PATH", DEFAULT_HEURISTIC_DIR_PATH),
        }
    }

    /// Directory holding git heuristics.
    pub fn heuristic_dir(&self) -> PathBuf {
        self.heuristic_repo_path.join(&self.heuristic_dir_path)
    }

    /// Image spec for a study's selected tar2bids image.
    ///
    /// Selected images live in `tar2bids_image_dir` and reuse the default
    /// image's binds.
    pub fn tar2bids_image(&self, selected: Option<&str>) -> ImageSpec {
        match selected {
            Some(name) if !name.is_empty() => ImageSpec::new(
                self.tar2bids_image_dir.join(name).to_string_lossy().into_owned(),
                self.tar2bids.binds.clone(),
            ),
            _ => self.tar2bids.clone(),
        }
    }

    /// RIA store for a dataset, honouring a per-dataset override.
    pub fn ria_url<'a>(&'a self, custom: Option<&'a str>) -> &'a str {
        custom.unwrap_or(&self.datalad_ria_url)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_path(key: &str, default: &std::path::Path) -> PathBuf {
    std::env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| default.to_path_buf())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| parse_flag(&v))
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Split a comma-separated list, dropping empty items.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
