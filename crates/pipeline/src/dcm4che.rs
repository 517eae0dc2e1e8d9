//! Client for the dcm4che tools: findscu queries and cfmm2tar retrieval.

use std::io::Write;
use std::path::Path;

use autobids_core::cfmm2tar::{self, Cfmm2tarArgs, Cfmm2tarError, RetrievedStudy, MAX_ATTEMPTS};
use autobids_core::dicom::{
    extract_pi_names, parse_findscu_json, Dcm4cheError, DicomAttribute, DicomQueryAttributes,
    FindscuConnection, JAVA_OPTIONS_NOISE,
};
use autobids_core::process::{CommandError, CommandRunner};
use autobids_core::tar2bids::{Tar2bidsArgs, Tar2bidsError};

use crate::apptainer::ImageSpec;
use crate::config::ToolConfig;

/// Retrieval level for study lookups.
pub const SERIES_LEVEL: &str = "SERIES";

/// Runs findscu, cfmm2tar and tar2bids through a [`CommandRunner`].
pub struct Dcm4cheClient<'a, R> {
    runner: &'a R,
    config: &'a ToolConfig,
}

impl<'a, R: CommandRunner> Dcm4cheClient<'a, R> {
    pub fn new(runner: &'a R, config: &'a ToolConfig) -> Self {
        Self { runner, config }
    }

    fn connection(&self) -> FindscuConnection {
        FindscuConnection {
            connect: self.config.dicom_server_url.clone(),
            username: self.config.dicom_server_username.clone(),
            password: self.config.dicom_server_password.clone(),
            use_tls: self.config.dicom_server_tls,
        }
    }

    /// Query the DICOM server, returning the requested fields of every match.
    pub async fn query_single_study(
        &self,
        output_fields: &[&str],
        attributes: &DicomQueryAttributes,
        retrieve_level: &str,
    ) -> Result<Vec<Vec<DicomAttribute>>, Dcm4cheError> {
        attributes.validate()?;

        let out_dir = tempfile::tempdir().map_err(CommandError::from)?;
        let args = self.connection().study_query_args(
            output_fields,
            attributes,
            retrieve_level,
            self.config.dicom_uid_wildcard,
            &out_dir.path().to_string_lossy(),
        );
        let output = self.runner.run(self.config.cfmm2tar.exec(&args)).await?;
        log_stderr(&output.stderr);
        if !output.success() {
            return Err(Dcm4cheError::Failed);
        }

        read_json_documents(out_dir.path())?
            .iter()
            .map(|document| parse_findscu_json(document, output_fields))
            .collect()
    }

    /// Every PI name visible to the configured account, minus the blacklist.
    pub async fn get_all_pi_names(&self) -> Result<Vec<String>, Dcm4cheError> {
        let args = self.connection().pi_query_args();
        let output = self.runner.run(self.config.cfmm2tar.exec(&args)).await?;
        log_stderr(&output.stderr);
        if !output.success() {
            return Err(Dcm4cheError::Failed);
        }
        extract_pi_names(&output.stdout, &self.config.dicom_pi_blacklist)
    }

    /// Run cfmm2tar once, returning the retrieved files and the tool output.
    pub async fn run_cfmm2tar(
        &self,
        args: &Cfmm2tarArgs,
    ) -> Result<(Vec<RetrievedStudy>, String), Cfmm2tarError> {
        let mut credentials = tempfile::NamedTempFile::new().map_err(CommandError::from)?;
        write!(
            credentials,
            "{}\n{}\n",
            self.config.dicom_server_username, self.config.dicom_server_password
        )
        .map_err(CommandError::from)?;
        credentials.flush().map_err(CommandError::from)?;

        let argv = cfmm2tar::build_args(
            args,
            &credentials.path().to_string_lossy(),
            &self.config.dicom_server_url,
        )?;
        let output = self.runner.run(self.config.cfmm2tar.exec(&argv)).await?;
        if !output.success() {
            return Err(cfmm2tar::classify_failure(&output.stderr));
        }
        let retrieved = cfmm2tar::parse_output(&output.stdout, &output.stderr)?;
        Ok((retrieved, output.combined()))
    }

    /// Run cfmm2tar, retrying while the DICOM server times out.
    pub async fn run_cfmm2tar_with_retries(
        &self,
        args: &Cfmm2tarArgs,
    ) -> Result<(Vec<RetrievedStudy>, String), Cfmm2tarError> {
        let mut attempt = 1;
        loop {
            match self.run_cfmm2tar(args).await {
                Err(Cfmm2tarError::Timeout) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        attempt,
                        patient_name = ?args.patient_name,
                        "cfmm2tar timed out, retrying"
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Run tar2bids in `image`, returning its combined output.
    pub async fn run_tar2bids(
        &self,
        image: &ImageSpec,
        args: &Tar2bidsArgs,
    ) -> Result<String, Tar2bidsError> {
        let output = self.runner.run(image.exec(&args.to_args())).await?;
        if !output.success() {
            return Err(Tar2bidsError::Failed(output.combined()));
        }
        Ok(output.combined())
    }
}

fn log_stderr(stderr: &str) {
    if !stderr.is_empty() && stderr != JAVA_OPTIONS_NOISE {
        tracing::warn!(stderr, "findscu wrote to stderr");
    }
}

/// Parse every `.json` document findscu wrote to `dir`, in file name order.
fn read_json_documents(dir: &Path) -> Result<Vec<serde_json::Value>, Dcm4cheError> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .map_err(CommandError::from)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    paths
        .iter()
        .map(|path| {
            let text = std::fs::read_to_string(path).map_err(CommandError::from)?;
            serde_json::from_str(&text).map_err(|e| {
                Dcm4cheError::Malformed(format!("{}: {e}", path.display()))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use autobids_core::dicom::ATTRIBUTES_QUERIED;
    use serde_json::json;

    use super::*;
    use crate::test_support::{arg_after, output, tool_config, ScriptedRunner};

    fn write_documents(spec: &autobids_core::process::CommandSpec, documents: &[serde_json::Value]) {
        let out_dir = arg_after(spec, "--out-dir").unwrap();
        for (i, document) in documents.iter().enumerate() {
            std::fs::write(
                Path::new(out_dir).join(format!("{i:03}.json")),
                document.to_string(),
            )
            .unwrap();
        }
    }

    fn series(uid: &str, number: i64) -> serde_json::Value {
        json!({
            "0020000D": {"vr": "UI", "Value": [uid]},
            "00100010": {"vr": "PN", "Value": [{"Alphabetic": "2024_01_02_P001"}]},
            "0008103E": {"vr": "LO", "Value": ["T1w"]},
            "00200011": {"vr": "IS", "Value": [number]},
            "00200010": {"vr": "SH", "Value": ["1"]},
            "00100020": {"vr": "LO", "Value": ["P001"]},
            "00100040": {"vr": "CS", "Value": ["F"]},
        })
    }

    #[tokio::test]
    async fn query_parses_every_document() {
        let runner = ScriptedRunner::new(|spec| {
            write_documents(spec, &[series("1.2.3", 1), series("1.2.3", 2)]);
            output("", JAVA_OPTIONS_NOISE, 0)
        });
        let config = tool_config();
        let client = Dcm4cheClient::new(&runner, &config);

        let responses = client
            .query_single_study(
                &ATTRIBUTES_QUERIED,
                &DicomQueryAttributes::by_uids(vec!["1.2.3".into()]),
                SERIES_LEVEL,
            )
            .await
            .unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[1][3].tag_name, "SeriesNumber");
        assert_eq!(responses[1][3].tag_value, "2");

        let call = &runner.calls()[0];
        assert_eq!(call.program, "findscu");
        assert_eq!(arg_after(call, "-L"), Some("SERIES"));
        assert_eq!(arg_after(call, "-m"), Some("StudyInstanceUID=1.2.3"));
    }

    #[tokio::test]
    async fn query_rejects_empty_attributes_without_running() {
        let runner = ScriptedRunner::succeeding();
        let config = tool_config();
        let client = Dcm4cheClient::new(&runner, &config);
        let result = client
            .query_single_study(&ATTRIBUTES_QUERIED, &DicomQueryAttributes::default(), SERIES_LEVEL)
            .await;
        assert_matches!(result, Err(Dcm4cheError::InvalidQuery(_)));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn query_failure_maps_to_failed() {
        let runner = ScriptedRunner::new(|_| output("", "connection refused", 2));
        let config = tool_config();
        let client = Dcm4cheClient::new(&runner, &config);
        let result = client
            .query_single_study(
                &ATTRIBUTES_QUERIED,
                &DicomQueryAttributes::by_uids(vec!["1".into()]),
                SERIES_LEVEL,
            )
            .await;
        assert_matches!(result, Err(Dcm4cheError::Failed));
    }

    #[tokio::test]
    async fn pi_names_filtered_by_blacklist() {
        let stdout = "\
(0008,1030) LO [Khan^NeuroAnalytics] StudyDescription
(0008,1030) LO [Test^Phantom] StudyDescription
(0008,1030) LO [Palaniyappan^Psychosis] StudyDescription
";
        let runner = ScriptedRunner::new(move |_| output(stdout, "", 0));
        let config = tool_config();
        let names = Dcm4cheClient::new(&runner, &config)
            .get_all_pi_names()
            .await
            .unwrap();
        assert_eq!(names, vec!["Khan", "Palaniyappan"]);
    }

    #[tokio::test]
    async fn cfmm2tar_passes_credentials_file() {
        let runner = ScriptedRunner::new(|spec| {
            let creds = std::fs::read_to_string(arg_after(spec, "-c").unwrap()).unwrap();
            assert_eq!(creds, "alice\nsecret\n");
            output(
                "Retrieving #1 of 1\ntar file created: /out/Khan_P_20240102_P001_1.A.tar\n",
                "",
                0,
            )
        });
        let config = tool_config();
        let args = Cfmm2tarArgs {
            out_dir: "/out".into(),
            patient_name: Some("P001".into()),
            ..Default::default()
        };
        let (retrieved, log) = Dcm4cheClient::new(&runner, &config)
            .run_cfmm2tar(&args)
            .await
            .unwrap();
        assert_eq!(retrieved.len(), 1);
        assert!(log.contains("tar file created"));
        assert_eq!(runner.calls()[0].program, "cfmm2tar");
    }

    #[tokio::test]
    async fn cfmm2tar_retries_timeouts_up_to_limit() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let runner = ScriptedRunner::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            output("", "at Timeout.java:60", 1)
        });
        let config = tool_config();
        let args = Cfmm2tarArgs {
            out_dir: "/out".into(),
            patient_name: Some("P001".into()),
            ..Default::default()
        };
        let result = Dcm4cheClient::new(&runner, &config)
            .run_cfmm2tar_with_retries(&args)
            .await;
        assert_matches!(result, Err(Cfmm2tarError::Timeout));
        assert_eq!(attempts.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn cfmm2tar_retry_stops_after_success() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let runner = ScriptedRunner::new(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                output("", "Timeout.java", 1)
            } else {
                output("nothing new", "", 0)
            }
        });
        let config = tool_config();
        let args = Cfmm2tarArgs {
            out_dir: "/out".into(),
            patient_name: Some("P001".into()),
            ..Default::default()
        };
        let (retrieved, _) = Dcm4cheClient::new(&runner, &config)
            .run_cfmm2tar_with_retries(&args)
            .await
            .unwrap();
        assert!(retrieved.is_empty());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn tar2bids_failure_carries_output() {
        let runner = ScriptedRunner::new(|_| output("converting", "heudiconv crashed", 1));
        let config = tool_config();
        let args = Tar2bidsArgs {
            tar_files: vec!["/data/a.tar".into()],
            output_dir: "/work/incoming".into(),
            ..Default::default()
        };
        let err = Dcm4cheClient::new(&runner, &config)
            .run_tar2bids(&config.tar2bids, &args)
            .await
            .unwrap_err();
        assert_matches!(err, Tar2bidsError::Failed(ref out) if out.contains("heudiconv crashed"));
        assert_eq!(runner.calls()[0].program, "apptainer");
    }
}
