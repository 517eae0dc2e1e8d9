//! Maintenance of the local heuristic git repository.

use autobids_core::process::{CommandError, CommandRunner, CommandSpec};

use crate::config::ToolConfig;

/// Clone the heuristic repository if it is missing, then pull.
pub async fn update_heuristics<R: CommandRunner>(
    runner: &R,
    config: &ToolConfig,
) -> Result<(), CommandError> {
    let repo = config.heuristic_repo_path.to_string_lossy().into_owned();
    let status = runner
        .run(CommandSpec::new("git").args(["-C", repo.as_str(), "status"]))
        .await?;
    if !status.success() {
        tracing::info!(path = %repo, "No heuristic repo present, cloning it");
        runner
            .run(CommandSpec::new("git").args([
                "clone",
                config.heuristic_git_url.as_str(),
                repo.as_str(),
            ]))
            .await?
            .check("git")?;
    }

    tracing::info!(path = %repo, "Pulling heuristic repo");
    runner
        .run(CommandSpec::new("git").args(["-C", repo.as_str(), "pull"]))
        .await?
        .check("git")?;
    Ok(())
}
