use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// File extensions the engine produces into the output directory.
const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// The three well-known engine directories, fully reset before each
/// top-level request.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Workspace {
    /// Directory the engine writes produced images into.
    pub output: PathBuf,
    /// Directory the engine reads input images from.
    pub input: PathBuf,
    /// Directory the engine uses for temporary files.
    pub temp: PathBuf,
}

impl Default for Workspace {
    fn default() -> Self {
        Self {
            output: PathBuf::from("/tmp/outputs"),
            input: PathBuf::from("/tmp/inputs"),
            temp: PathBuf::from("ComfyUI/temp"),
        }
    }
}

impl Workspace {
    /// All three workspace directories.
    pub fn directories(&self) -> [&Path; 3] {
        [&self.output, &self.input, &self.temp]
    }

    /// Removes and recreates every workspace directory, so no file from a
    /// previous request survives into the next one.
    pub fn cleanup(&self) -> anyhow::Result<()> {
        for dir in self.directories() {
            if dir.exists() {
                fs::remove_dir_all(dir)
                    .with_context(|| format!("failed to clear {}", dir.display()))?;
            }
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            debug!(dir = %dir.display(), "workspace directory reset");
        }
        Ok(())
    }

    /// Lists the image files currently present in the output directory,
    /// sorted by filename.
    pub fn output_images(&self) -> anyhow::Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.output)
            .with_context(|| format!("failed to read {}", self.output.display()))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.context("failed to read directory entry")?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if path.is_file() && is_image {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Lists output images whose filename stem has not been seen before,
    /// recording their stems in `seen`. Images produced by a prior
    /// submission within the same request are skipped.
    pub fn unseen_outputs(&self, seen: &mut HashSet<OsString>) -> anyhow::Result<Vec<PathBuf>> {
        Ok(self
            .output_images()?
            .into_iter()
            .filter(|path| match path.file_stem() {
                Some(stem) => seen.insert(stem.to_os_string()),
                None => false,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace_in(root: &Path) -> Workspace {
        Workspace {
            output: root.join("outputs"),
            input: root.join("inputs"),
            temp: root.join("temp"),
        }
    }

    #[test]
    fn cleanup_leaves_all_directories_empty() {
        let root = tempfile::tempdir().unwrap();
        let workspace = workspace_in(root.path());
        workspace.cleanup().unwrap();
        fs::write(workspace.output.join("stale_00001_.png"), b"x").unwrap();
        fs::write(workspace.temp.join("scratch.bin"), b"x").unwrap();

        workspace.cleanup().unwrap();

        for dir in workspace.directories() {
            assert!(dir.exists());
            assert_eq!(fs::read_dir(dir).unwrap().count(), 0);
        }
    }

    #[test]
    fn output_images_skips_non_image_files() {
        let root = tempfile::tempdir().unwrap();
        let workspace = workspace_in(root.path());
        workspace.cleanup().unwrap();
        fs::write(workspace.output.join("img_00002_.png"), b"x").unwrap();
        fs::write(workspace.output.join("img_00001_.png"), b"x").unwrap();
        fs::write(workspace.output.join("notes.txt"), b"x").unwrap();

        let files = workspace.output_images().unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["img_00001_.png", "img_00002_.png"]);
    }

    #[test]
    fn unseen_outputs_yields_each_stem_once() {
        let root = tempfile::tempdir().unwrap();
        let workspace = workspace_in(root.path());
        workspace.cleanup().unwrap();
        let mut seen = HashSet::new();

        fs::write(workspace.output.join("img_00001_.png"), b"x").unwrap();
        let first = workspace.unseen_outputs(&mut seen).unwrap();
        assert_eq!(first.len(), 1);

        // A later submission adds one new file next to the old one.
        fs::write(workspace.output.join("img_00002_.png"), b"x").unwrap();
        let second = workspace.unseen_outputs(&mut seen).unwrap();
        let names: Vec<_> = second
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["img_00002_.png"]);

        assert!(workspace.unseen_outputs(&mut seen).unwrap().is_empty());
    }
}
