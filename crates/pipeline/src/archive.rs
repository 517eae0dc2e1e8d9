//! Zip archives of datasets and their upload to the archive host.

use std::fs::File;
use std::path::Path;

use autobids_core::process::CommandSpec;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::PipelineError;

/// Directory left out of archives.
const GIT_DIR: &str = ".git";

/// Zip the contents of `dataset` into `dest`, following symlinks so
/// fetched annex content is stored.
pub fn zip_dataset(dataset: &Path, dest: &Path) -> Result<(), PipelineError> {
    let mut writer = ZipWriter::new(File::create(dest)?);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true);
    add_dir(&mut writer, dataset, "", options)?;
    writer.finish()?;
    Ok(())
}

fn add_dir(
    writer: &mut ZipWriter<File>,
    dir: &Path,
    prefix: &str,
    options: SimpleFileOptions,
) -> Result<(), PipelineError> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == GIT_DIR {
            continue;
        }
        let path = entry.path();
        let archived = format!("{prefix}{name}");
        if std::fs::metadata(&path)?.is_dir() {
            writer.add_directory(format!("{archived}/"), options)?;
            add_dir(writer, &path, &format!("{archived}/"), options)?;
        } else {
            writer.start_file(archived, options)?;
            std::io::copy(&mut File::open(&path)?, writer)?;
        }
    }
    Ok(())
}

/// Remote location archives are copied to, parsed from `host:path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTarget {
    pub host: String,
    pub base_path: String,
    pub ssh_port: u16,
    pub ssh_key: String,
}

impl ArchiveTarget {
    pub fn parse(base_url: &str, ssh_port: u16, ssh_key: &str) -> Result<Self, PipelineError> {
        let (host, base_path) = base_url
            .split_once(':')
            .filter(|(host, path)| !host.is_empty() && !path.is_empty())
            .ok_or_else(|| {
                PipelineError::Config(format!("ARCHIVE_BASE_URL must be host:path, got {base_url:?}"))
            })?;
        Ok(Self {
            host: host.to_string(),
            base_path: base_path.trim_end_matches('/').to_string(),
            ssh_port,
            ssh_key: ssh_key.to_string(),
        })
    }

    /// Directory holding one dataset's archives.
    pub fn dataset_dir(&self, alias: &str) -> String {
        format!("{}/{alias}", self.base_path)
    }

    fn ssh(&self) -> CommandSpec {
        CommandSpec::new("ssh")
            .arg("-p")
            .arg(self.ssh_port.to_string())
            .arg("-i")
            .arg(&self.ssh_key)
            .arg(&self.host)
    }

    pub fn mkdir(&self, alias: &str) -> CommandSpec {
        self.ssh().args(["mkdir", "-p"]).arg(self.dataset_dir(alias))
    }

    pub fn upload(&self, archive: &Path, alias: &str) -> CommandSpec {
        CommandSpec::new("scp")
            .arg("-P")
            .arg(self.ssh_port.to_string())
            .arg("-i")
            .arg(&self.ssh_key)
            .arg(archive.to_string_lossy())
            .arg(format!("{}:{}", self.host, self.dataset_dir(alias)))
    }

    /// Delete every file in the dataset's directory except `keep`.
    pub fn prune(&self, alias: &str, keep: &str) -> CommandSpec {
        self.ssh()
            .arg("find")
            .arg(self.dataset_dir(alias))
            .args(["!", "-name", keep, "-type", "f", "-exec", "rm", "-f", "{}", "+"])
    }
}
