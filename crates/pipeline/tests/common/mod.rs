//! Shared fixtures for task execution tests.

use std::path::PathBuf;
use std::sync::Mutex;

use autobids_core::process::{CommandError, CommandOutput, CommandRunner, CommandSpec};
use autobids_db::models::study::{CreateStudy, Study};
use autobids_db::models::task::Task;
use autobids_db::repositories::{StudyRepo, TaskRepo};
use autobids_pipeline::apptainer::ImageSpec;
use autobids_pipeline::{launch_task, Pipeline, TaskPayload, ToolConfig};
use sqlx::PgPool;

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

    pub fn succeeding() -> Self {
        Self::new(|_| CommandOutput::default())
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(CommandSpec::command_line)
            .collect()
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

/// Handles `datalad clone` by creating the clone directory with a README.
pub fn fake_clone(spec: &CommandSpec) -> bool {
    if spec.program == "datalad" && spec.args.first().map(String::as_str) == Some("clone") {
        let path = PathBuf::from(spec.args.last().unwrap());
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("README"), "dataset").unwrap();
        return true;
    }
    false
}

pub fn tool_config() -> ToolConfig {
    ToolConfig {
        dicom_server_url: "CFMM@dicom.example.org:11112".into(),
        dicom_server_username: "alice".into(),
        dicom_server_password: "secret".into(),
        dicom_server_tls: false,
        dicom_uid_wildcard: false,
        dicom_pi_blacklist: Vec::new(),
        cfmm2tar: ImageSpec::default(),
        tar2bids: ImageSpec::default(),
        cfmm2tar_download_dir: std::env::temp_dir(),
        tar2bids_download_dir: std::env::temp_dir(),
        tar2bids_temp_dir: std::env::temp_dir(),
        tar2bids_image_dir: PathBuf::from("/images"),
        tar2bids_default_image: "tar2bids.sif".into(),
        datalad_ria_url: "ria+file:///ria".into(),
        archive_base_url: "archive.example.org:/archive".into(),
        archive_ssh_port: 22,
        archive_ssh_key: "/keys/id".into(),
        heuristic_git_url: "https://example.org/heuristics.git".into(),
        heuristic_repo_path: PathBuf::from("/srv/heuristics"),
        heuristic_dir_path: "heuristics".into(),
    }
}

pub fn pipeline(pool: &PgPool, runner: ScriptedRunner) -> Pipeline<ScriptedRunner> {
    Pipeline::new(pool.clone(), tool_config(), runner, None)
}

pub async fn create_study(pool: &PgPool) -> Study {
    StudyRepo::create(
        pool,
        &CreateStudy {
            submitter_name: "Jane Doe".to_string(),
            submitter_email: "jane@example.com".to_string(),
            status: "faculty".to_string(),
            scanner: "type2".to_string(),
            scan_number: 10,
            study_type: true,
            familiarity: std::array::from_fn(|_| "3".to_string()),
            principal: "Khan".to_string(),
            project_name: "Neuro".to_string(),
            dataset_name: "neuro".to_string(),
            sample_date: None,
            retrospective_data: false,
            retrospective_start: None,
            retrospective_end: None,
            consent: true,
            comment: None,
        },
    )
    .await
    .unwrap()
}

/// Queue a task and claim it the way a worker would.
pub async fn queue_and_claim(pool: &PgPool, payload: TaskPayload) -> Task {
    launch_task(pool, &payload, "test task", None).await.unwrap();
    TaskRepo::claim_next(pool).await.unwrap().unwrap()
}

pub async fn reload(pool: &PgPool, task: &Task) -> Task {
    TaskRepo::find_by_id(pool, task.id).await.unwrap().unwrap()
}
