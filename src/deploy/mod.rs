//! Mirror build output into the deploy destination.
//!
//! `deploy_all` copies the whole output tree over the destination;
//! `deploy_resource` replaces a single `<destination>/<identity>` subtree.
//! Files are copied in parallel and keep their permission bits. Without
//! a destination every operation is a no-op.

use jwalk::WalkDir;
use rayon::prelude::*;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::{config::ProjectConfig, debug, utils::plural_count};

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("failed to {action} `{}`: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("build output `{}` does not exist", .0.display())]
    MissingOutput(PathBuf),
}

impl DeployError {
    fn io<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> Self + 'a {
        move |source| Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What one deploy copied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeployStats {
    pub files: usize,
    pub dirs: usize,
}

#[derive(Debug, Clone)]
pub struct Deployer {
    output: PathBuf,
    destination: Option<PathBuf>,
}

impl Deployer {
    pub fn new(output: impl Into<PathBuf>, destination: Option<PathBuf>) -> Self {
        Self {
            output: output.into(),
            destination,
        }
    }

    pub fn from_config(config: &ProjectConfig) -> Self {
        Self::new(&config.output, config.destination.clone())
    }

    pub fn is_enabled(&self) -> bool {
        self.destination.is_some()
    }

    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    /// Copy the whole output directory into the destination.
    pub fn deploy_all(&self) -> Result<DeployStats, DeployError> {
        let Some(destination) = &self.destination else {
            return Ok(DeployStats::default());
        };
        if !self.output.is_dir() {
            return Err(DeployError::MissingOutput(self.output.clone()));
        }

        let stats = mirror(&self.output, destination)?;
        debug!(
            "deploy";
            "{}, {} -> {}",
            plural_count(stats.files, "file"),
            plural_count(stats.dirs, "folder"),
            destination.display()
        );
        Ok(stats)
    }

    /// Replace `<destination>/<identity>` with `<output>/<identity>`.
    pub fn deploy_resource(&self, identity: &str) -> Result<DeployStats, DeployError> {
        let Some(destination) = &self.destination else {
            return Ok(DeployStats::default());
        };
        let source = self.output.join(identity);
        if !source.is_dir() {
            return Err(DeployError::MissingOutput(source));
        }

        let target = destination.join(identity);
        if target.exists() {
            fs::remove_dir_all(&target).map_err(DeployError::io("remove", &target))?;
        }

        let stats = mirror(&source, &target)?;
        debug!("deploy"; "{}: {}", identity, plural_count(stats.files, "file"));
        Ok(stats)
    }
}

/// Copy the tree under `src` into `dst`, overwriting existing files.
fn mirror(src: &Path, dst: &Path) -> Result<DeployStats, DeployError> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in WalkDir::new(src).skip_hidden(false).sort(true) {
        let entry = entry.map_err(|e| DeployError::Io {
            action: "read",
            path: src.to_path_buf(),
            source: io::Error::other(e.to_string()),
        })?;
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(src) else {
            continue;
        };
        if entry.file_type().is_dir() {
            dirs.push((path.clone(), dst.join(relative)));
        } else {
            files.push((path.clone(), dst.join(relative)));
        }
    }

    // Parents first (walk order), so every file has somewhere to land.
    for (from, to) in &dirs {
        fs::create_dir_all(to).map_err(DeployError::io("create", to))?;
        let permissions = fs::metadata(from)
            .map_err(DeployError::io("read", from))?
            .permissions();
        fs::set_permissions(to, permissions).map_err(DeployError::io("chmod", to))?;
    }

    // `fs::copy` carries the permission bits over.
    files
        .par_iter()
        .try_for_each(|(from, to)| {
            fs::copy(from, to)
                .map(|_| ())
                .map_err(DeployError::io("copy", to))
        })?;

    Ok(DeployStats {
        files: files.len(),
        dirs: dirs.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn setup() -> (tempfile::TempDir, Deployer) {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("dist");
        write(&output.join("admin/server.js"), "admin v1");
        write(&output.join("admin/ui/index.html"), "<html>");
        write(&output.join("chat/client.js"), "chat v1");
        let deployer = Deployer::new(&output, Some(dir.path().join("server/resources")));
        (dir, deployer)
    }

    #[test]
    fn test_deploy_all_mirrors_tree() {
        let (dir, deployer) = setup();
        let stats = deployer.deploy_all().unwrap();

        let dest = dir.path().join("server/resources");
        assert_eq!(stats.files, 3);
        assert_eq!(fs::read_to_string(dest.join("admin/server.js")).unwrap(), "admin v1");
        assert!(dest.join("admin/ui/index.html").is_file());
        assert!(dest.join("chat/client.js").is_file());
    }

    #[test]
    fn test_deploy_resource_replaces_subtree() {
        let (dir, deployer) = setup();
        deployer.deploy_all().unwrap();

        let dest = dir.path().join("server/resources");
        write(&dest.join("admin/stale.js"), "old");
        write(&dir.path().join("dist/admin/server.js"), "admin v2");
        write(&dir.path().join("dist/chat/client.js"), "chat v2");

        let stats = deployer.deploy_resource("admin").unwrap();
        assert_eq!(stats.files, 2);
        assert_eq!(fs::read_to_string(dest.join("admin/server.js")).unwrap(), "admin v2");
        assert!(!dest.join("admin/stale.js").exists());
        // other resources are untouched
        assert_eq!(fs::read_to_string(dest.join("chat/client.js")).unwrap(), "chat v1");
    }

    #[test]
    fn test_deploy_without_destination_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let deployer = Deployer::new(dir.path().join("missing"), None);
        assert!(!deployer.is_enabled());
        assert_eq!(deployer.deploy_all().unwrap(), DeployStats::default());
        assert_eq!(deployer.deploy_resource("admin").unwrap(), DeployStats::default());
    }

    #[test]
    fn test_deploy_missing_output() {
        let (dir, deployer) = setup();
        let err = deployer.deploy_resource("ghost").unwrap_err();
        assert!(matches!(err, DeployError::MissingOutput(p) if p == dir.path().join("dist/ghost")));
    }

    #[cfg(unix)]
    #[test]
    fn test_deploy_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, deployer) = setup();
        let script = dir.path().join("dist/admin/run.sh");
        write(&script, "#!/bin/sh\n");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        deployer.deploy_resource("admin").unwrap();
        let copied = dir.path().join("server/resources/admin/run.sh");
        let mode = fs::metadata(copied).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
