//! Scripted command runner and fixtures shared by the unit tests.

use std::path::PathBuf;
use std::sync::Mutex;

use autobids_core::process::{CommandError, CommandOutput, CommandRunner, CommandSpec};

use crate::apptainer::ImageSpec;
use crate::config::ToolConfig;

type Handler = Box<dyn Fn(&CommandSpec) -> CommandOutput + Send + Sync>;

/// Records every command and answers with the handler's output.
pub struct ScriptedRunner {
    calls: Mutex<Vec<CommandSpec>>,
    handler: Handler,
}

impl ScriptedRunner {
    pub fn new(handler: impl Fn(&CommandSpec) -> CommandOutput + Send + Sync + 'static) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        }
    }

    /// Every command exits 0 with no output.
    pub fn succeeding() -> Self {
        Self::new(|_| CommandOutput::default())
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::command_line).collect()
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, CommandError> {
        let output = (self.handler)(&spec);
        self.calls.lock().unwrap().push(spec);
        Ok(output)
    }
}

pub fn output(stdout: &str, stderr: &str, exit_code: i32) -> CommandOutput {
    CommandOutput {
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        exit_code,
        duration_ms: 1,
    }
}

pub fn tool_config() -> ToolConfig {
    ToolConfig {
        dicom_server_url: "CFMM@dicom.example.org:11112".into(),
        dicom_server_username: "alice".into(),
        dicom_server_password: "secret".into(),
        dicom_server_tls: true,
        dicom_uid_wildcard: false,
        dicom_pi_blacklist: vec!["Test".into()],
        cfmm2tar: ImageSpec::default(),
        tar2bids: ImageSpec::new("/images/tar2bids.sif", vec!["/data".into()]),
        cfmm2tar_download_dir: std::env::temp_dir(),
        tar2bids_download_dir: std::env::temp_dir(),
        tar2bids_temp_dir: std::env::temp_dir(),
        tar2bids_image_dir: PathBuf::from("/images"),
        tar2bids_default_image: "tar2bids.sif".into(),
        datalad_ria_url: "ria+file:///ria".into(),
        archive_base_url: "archive.example.org:/archive".into(),
        archive_ssh_port: 2222,
        archive_ssh_key: "/keys/id_ed25519".into(),
        heuristic_git_url: "https://example.org/heuristics.git".into(),
        heuristic_repo_path: PathBuf::from("/srv/heuristics"),
        heuristic_dir_path: "heuristics".into(),
    }
}

/// Value following `flag` in an argument list.
pub fn arg_after<'a>(spec: &'a CommandSpec, flag: &str) -> Option<&'a str> {
    spec.args
        .iter()
        .position(|a| a == flag)
        .and_then(|i| spec.args.get(i + 1))
        .map(String::as_str)
}
