//! `apptainer exec` wrapping for containerized tools.

use autobids_core::process::CommandSpec;

/// A container image and the bind mounts it runs with.
///
/// An empty `image_path` runs tools directly on the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSpec {
    pub image_path: String,
    pub binds: Vec<String>,
}

impl ImageSpec {
    pub fn new(image_path: impl Into<String>, binds: Vec<String>) -> Self {
        Self {
            image_path: image_path.into(),
            binds,
        }
    }

    /// Build the command running `args` inside this image.
    ///
    /// `args[0]` is the program to run.
    pub fn exec(&self, args: &[String]) -> CommandSpec {
        if self.image_path.is_empty() {
            let (program, rest) = match args.split_first() {
                Some((program, rest)) => (program.as_str(), rest),
                None => ("true", &[][..]),
            };
            return CommandSpec::new(program).args(rest.iter().cloned());
        }

        let mut spec = CommandSpec::new("apptainer").arg("exec");
        for bind in &self.binds {
            spec = spec.arg("-B").arg(bind);
        }
        spec.arg(&self.image_path).args(args.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exec_wraps_in_apptainer_with_binds() {
        let spec = ImageSpec::new("/images/cfmm2tar.sif", args(&["/data", "/scratch:/tmp"]))
            .exec(&args(&["findscu", "--bind", "DEFAULT"]));
        assert_eq!(spec.program, "apptainer");
        assert_eq!(
            spec.args,
            args(&[
                "exec", "-B", "/data", "-B", "/scratch:/tmp", "/images/cfmm2tar.sif", "findscu",
                "--bind", "DEFAULT",
            ])
        );
    }

    #[test]
    fn exec_without_image_runs_on_host() {
        let spec = ImageSpec::default().exec(&args(&["cfmm2tar", "-c", "creds"]));
        assert_eq!(spec.program, "cfmm2tar");
        assert_eq!(spec.args, args(&["-c", "creds"]));
    }
}
