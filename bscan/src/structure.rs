//! Directory skeleton builder.
//!
//! Each target gets a `<output-dir>/<target>.bscan.d/` tree with fixed
//! `notes.txt`, `recommendations.txt`, `loot/`, `services/`, `sploits/`
//! members.

use std::path::{Path, PathBuf};

use bscan_core::BscanError;

/// Path helpers for one target's output tree.
#[derive(Debug, Clone)]
pub struct TargetPaths {
    base: PathBuf,
}

impl TargetPaths {
    pub fn new(output_dir: &Path, target: &str) -> Self {
        Self {
            base: output_dir.join(format!("{target}.bscan.d")),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn notes(&self) -> PathBuf {
        self.base.join("notes.txt")
    }

    pub fn recommendations(&self) -> PathBuf {
        self.base.join("recommendations.txt")
    }

    pub fn loot_dir(&self) -> PathBuf {
        self.base.join("loot")
    }

    pub fn loot_proof(&self) -> PathBuf {
        self.loot_dir().join("proof.txt")
    }

    pub fn loot_local(&self) -> PathBuf {
        self.loot_dir().join("local.txt")
    }

    pub fn services_dir(&self) -> PathBuf {
        self.base.join("services")
    }

    pub fn sploits_dir(&self) -> PathBuf {
        self.base.join("sploits")
    }

    /// Creates the full tree. If the base directory already exists and
    /// `hard` is false, the target is skipped. With `hard`, any
    /// existing tree is removed and rebuilt from scratch.
    pub fn create(&self, target: &str, hard: bool) -> Result<(), BscanError> {
        if self.base.exists() {
            if !hard {
                return Err(BscanError::SkipTarget {
                    target: target.to_string(),
                    reason: format!("{} already exists (use --hard to overwrite)", self.base.display()),
                });
            }
            std::fs::remove_dir_all(&self.base).map_err(|e| {
                BscanError::Internal(format!("failed to remove {}: {e}", self.base.display()))
            })?;
        }

        for dir in [&self.base, &self.loot_dir(), &self.services_dir(), &self.sploits_dir()] {
            std::fs::create_dir_all(dir)
                .map_err(|e| BscanError::Internal(format!("failed to create {}: {e}", dir.display())))?;
        }

        for file in [
            self.notes(),
            self.recommendations(),
            self.loot_proof(),
            self.loot_local(),
        ] {
            std::fs::File::create(&file)
                .map_err(|e| BscanError::Internal(format!("failed to create {}: {e}", file.display())))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("bscan-structure-test-{name}-{}", std::process::id()))
    }

    #[test]
    fn creates_full_skeleton() {
        let out = scratch_dir("fresh");
        std::fs::create_dir_all(&out).unwrap();
        let paths = TargetPaths::new(&out, "10.0.0.1");

        paths.create("10.0.0.1", false).unwrap();

        assert!(paths.notes().exists());
        assert!(paths.recommendations().exists());
        assert!(paths.loot_proof().exists());
        assert!(paths.loot_local().exists());
        assert!(paths.services_dir().is_dir());
        assert!(paths.sploits_dir().is_dir());

        std::fs::remove_dir_all(&out).ok();
    }

    #[test]
    fn existing_dir_without_hard_is_skipped() {
        let out = scratch_dir("existing");
        std::fs::create_dir_all(&out).unwrap();
        let paths = TargetPaths::new(&out, "10.0.0.1");
        paths.create("10.0.0.1", false).unwrap();

        let err = paths.create("10.0.0.1", false).unwrap_err();
        assert!(matches!(err, BscanError::SkipTarget { .. }));
        assert!(!err.is_fatal());

        std::fs::remove_dir_all(&out).ok();
    }

    #[test]
    fn hard_recreates_existing_dir() {
        let out = scratch_dir("hard");
        std::fs::create_dir_all(&out).unwrap();
        let paths = TargetPaths::new(&out, "10.0.0.1");
        paths.create("10.0.0.1", false).unwrap();
        std::fs::write(paths.notes(), b"stale notes").unwrap();

        paths.create("10.0.0.1", true).unwrap();
        let contents = std::fs::read_to_string(paths.notes()).unwrap();
        assert!(contents.is_empty());

        std::fs::remove_dir_all(&out).ok();
    }
}
