//! tar2bids argument building.

use crate::process::CommandError;

/// Location of the tar2bids entry point inside its container image.
pub const TAR2BIDS_BIN: &str = "/opt/tar2bids/tar2bids";

#[derive(Debug, thiserror::Error)]
pub enum Tar2bidsError {
    #[error("Tar2bids failed:\n{0}")]
    Failed(String),

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Arguments for one tar2bids invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tar2bidsArgs {
    pub tar_files: Vec<String>,
    pub output_dir: String,
    /// Pattern for the subject label within the PatientName.
    pub patient_str: Option<String>,
    pub heuristic: Option<String>,
    pub temp_dir: Option<String>,
    /// Path to an extra `.bidsignore` file.
    pub bidsignore: Option<String>,
    pub deface: bool,
}

impl Tar2bidsArgs {
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![TAR2BIDS_BIN.to_string()];
        if let Some(patient_str) = &self.patient_str {
            args.extend(["-P".to_string(), patient_str.clone()]);
        }
        args.extend(["-o".to_string(), self.output_dir.clone()]);
        if let Some(heuristic) = &self.heuristic {
            args.extend(["-h".to_string(), heuristic.clone()]);
        }
        if let Some(temp_dir) = &self.temp_dir {
            args.extend(["-w".to_string(), temp_dir.clone()]);
        }
        if let Some(bidsignore) = &self.bidsignore {
            args.extend(["-b".to_string(), bidsignore.clone()]);
        }
        if self.deface {
            args.push("-D".to_string());
        }
        args.extend(self.tar_files.iter().cloned());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_args() {
        let args = Tar2bidsArgs {
            tar_files: vec!["/data/a.tar".into()],
            output_dir: "/work/incoming".into(),
            ..Default::default()
        };
        assert_eq!(
            args.to_args(),
            vec![TAR2BIDS_BIN, "-o", "/work/incoming", "/data/a.tar"]
        );
    }

    #[test]
    fn full_args_in_flag_order() {
        let args = Tar2bidsArgs {
            tar_files: vec!["/data/a.tar".into(), "/data/b.tar".into()],
            output_dir: "/work/incoming".into(),
            patient_str: Some("*_{subject}".into()),
            heuristic: Some("cfmm_base.py".into()),
            temp_dir: Some("/scratch".into()),
            bidsignore: Some("/work/.bidsignore".into()),
            deface: true,
        };
        assert_eq!(
            args.to_args(),
            vec![
                TAR2BIDS_BIN, "-P", "*_{subject}", "-o", "/work/incoming", "-h", "cfmm_base.py",
                "-w", "/scratch", "-b", "/work/.bidsignore", "-D", "/data/a.tar", "/data/b.tar",
            ]
        );
    }
}
