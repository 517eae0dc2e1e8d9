//! cfmm2tar invocation and output parsing.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::process::CommandError;

/// Number of times a cfmm2tar run is attempted when the server times out.
pub const MAX_ATTEMPTS: u32 = 5;

/// Marker cfmm2tar prints in its Java stack trace when the DICOM server
/// stops responding.
const TIMEOUT_MARKER: &str = "Timeout.java";

static TAR_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z]+_\w+_(\d{8})_[\w\-]+_[\.a-zA-Z\d]+\.tar$").expect("valid regex")
});

#[derive(Debug, thiserror::Error)]
pub enum Cfmm2tarError {
    #[error("At least one search argument must be provided.")]
    NoSearchArguments,

    #[error("cfmm2tar timed out.")]
    Timeout,

    #[error("Cfmm2tar failed:\n{0}")]
    Failed(String),

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Arguments for one cfmm2tar invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cfmm2tarArgs {
    /// Directory tar files are written to.
    pub out_dir: String,
    pub study_instance_uid: Option<String>,
    /// One or two dates joined by `-`, optionally open-ended.
    pub date_str: Option<String>,
    pub patient_name: Option<String>,
    /// `PI^Project` to search for.
    pub project: Option<String>,
}

impl Cfmm2tarArgs {
    pub fn has_search_argument(&self) -> bool {
        self.study_instance_uid.is_some()
            || self.date_str.is_some()
            || self.patient_name.is_some()
            || self.project.is_some()
    }
}

/// Build the cfmm2tar argument vector.
///
/// `credentials_path` points at a two-line file holding the DICOM username
/// and password.
pub fn build_args(
    args: &Cfmm2tarArgs,
    credentials_path: &str,
    server_url: &str,
) -> Result<Vec<String>, Cfmm2tarError> {
    if !args.has_search_argument() {
        return Err(Cfmm2tarError::NoSearchArguments);
    }

    let mut out: Vec<String> = vec!["cfmm2tar".into(), "-c".into(), credentials_path.into()];
    let optional = [
        ("-u", &args.study_instance_uid),
        ("-d", &args.date_str),
        ("-n", &args.patient_name),
        ("-p", &args.project),
    ];
    for (flag, value) in optional {
        if let Some(value) = value {
            out.push(flag.to_string());
            out.push(value.clone());
        }
    }
    out.extend(["-s".to_string(), server_url.to_string(), args.out_dir.clone()]);
    Ok(out)
}

/// One retrieved study: its tar file and the uid file written beside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedStudy {
    pub tar_file: String,
    pub uid_file: Option<String>,
}

/// Parse the combined cfmm2tar output into retrieved files.
///
/// Output is split into per-study blocks at `Retrieving #`. An empty result
/// with a Java timeout trace means the run should be retried.
pub fn parse_output(stdout: &str, stderr: &str) -> Result<Vec<RetrievedStudy>, Cfmm2tarError> {
    let all_out = format!("{stdout}{stderr}");
    let retrieved: Vec<RetrievedStudy> = all_out
        .split("Retrieving #")
        .skip(1)
        .filter_map(|block| {
            let mut tar_file = None;
            let mut uid_file = None;
            for line in block.lines() {
                if let Some((_, path)) = line.split_once("tar file created: ") {
                    tar_file = Some(path.trim().to_string());
                } else if let Some((_, path)) = line.split_once("uid file created: ") {
                    uid_file = Some(path.trim().to_string());
                }
            }
            tar_file.map(|tar_file| RetrievedStudy { tar_file, uid_file })
        })
        .collect();

    if retrieved.is_empty() && all_out.contains(TIMEOUT_MARKER) {
        return Err(Cfmm2tarError::Timeout);
    }
    Ok(retrieved)
}

/// Classify a non-zero cfmm2tar exit.
pub fn classify_failure(stderr: &str) -> Cfmm2tarError {
    if stderr.contains(TIMEOUT_MARKER) {
        Cfmm2tarError::Timeout
    } else {
        Cfmm2tarError::Failed(stderr.to_string())
    }
}

/// Scan date encoded in a cfmm2tar file name, e.g.
/// `Khan_Project_20240102_P001_1.ABC123.tar`.
pub fn parse_tar_file_date(file_name: &str) -> Option<NaiveDate> {
    let caps = TAR_DATE_RE.captures(file_name)?;
    NaiveDate::parse_from_str(&caps[1], "%Y%m%d").ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
