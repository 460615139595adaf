//! Sandboxed filesystem shim. Reads resolve against the working
//! directory, writes against the output directory (falling back to
//! the working directory when no output directory is configured).

use crate::error::{FacadeError, FacadeResult};
use pcore_permissions::{check_fs, normalize_path, FsOp};
use pcore_protocol::FsPermission;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct Metadata {
    pub is_dir: bool,
    pub is_file: bool,
    pub len: u64,
}

pub struct FsShim {
    workdir: PathBuf,
    outdir: PathBuf,
    permissions: FsPermission,
    dry_run: bool,
}

/// A path pattern treated as "the artifact directory" — writes here
/// always fail, pointing the caller at the artifact broker instead.
const ARTIFACT_DIR_MARKER: &str = "artifacts/";

impl FsShim {
    pub fn new(workdir: PathBuf, outdir: Option<PathBuf>, permissions: FsPermission, dry_run: bool) -> Self {
        let outdir = outdir.unwrap_or_else(|| workdir.clone());
        Self { workdir, outdir, permissions, dry_run }
    }

    fn resolve(&self, base: &Path, path: &str) -> FacadeResult<PathBuf> {
        let normalized = normalize_path(path);
        if normalized.split('/').any(|segment| segment == "..") {
            return Err(FacadeError::PathTraversal(path.to_string()));
        }
        Ok(base.join(&normalized))
    }

    fn gate(&self, path: &str, op: FsOp) -> FacadeResult<()> {
        if path.starts_with(ARTIFACT_DIR_MARKER) || path.contains(&format!("/{ARTIFACT_DIR_MARKER}")) {
            return Err(FacadeError::PermissionDenied(
                pcore_permissions::GateDecision::deny(
                    "direct writes to the artifact directory are not allowed",
                )
                .with_remediation("use the artifact broker's write() instead"),
            ));
        }
        let decision = check_fs(&self.permissions, path, op);
        if decision.granted {
            Ok(())
        } else {
            Err(FacadeError::PermissionDenied(decision))
        }
    }

    pub async fn read_file(&self, path: &str) -> FacadeResult<Vec<u8>> {
        self.gate(path, FsOp::Read)?;
        let resolved = self.resolve(&self.workdir, path)?;
        Ok(tokio::fs::read(resolved).await?)
    }

    pub async fn read_text(&self, path: &str) -> FacadeResult<String> {
        let bytes = self.read_file(path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn write_file(&self, path: &str, data: &[u8]) -> FacadeResult<()> {
        self.gate(path, FsOp::Write)?;
        let resolved = self.resolve(&self.outdir, path)?;
        if self.dry_run {
            info!(path = %resolved.display(), bytes = data.len(), "dry-run: would write file");
            return Ok(());
        }
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(resolved, data).await?;
        Ok(())
    }

    pub async fn mkdir(&self, path: &str, recursive: bool) -> FacadeResult<()> {
        self.gate(path, FsOp::Write)?;
        let resolved = self.resolve(&self.outdir, path)?;
        if self.dry_run {
            info!(path = %resolved.display(), "dry-run: would mkdir");
            return Ok(());
        }
        if recursive {
            tokio::fs::create_dir_all(resolved).await?;
        } else {
            tokio::fs::create_dir(resolved).await?;
        }
        Ok(())
    }

    pub async fn unlink(&self, path: &str) -> FacadeResult<()> {
        self.gate(path, FsOp::Write)?;
        let resolved = self.resolve(&self.outdir, path)?;
        if self.dry_run {
            info!(path = %resolved.display(), "dry-run: would unlink");
            return Ok(());
        }
        tokio::fs::remove_file(resolved).await?;
        Ok(())
    }

    pub async fn rmdir(&self, path: &str) -> FacadeResult<()> {
        self.gate(path, FsOp::Write)?;
        let resolved = self.resolve(&self.outdir, path)?;
        if self.dry_run {
            info!(path = %resolved.display(), "dry-run: would rmdir");
            return Ok(());
        }
        tokio::fs::remove_dir(resolved).await?;
        Ok(())
    }

    pub async fn readdir(&self, path: &str) -> FacadeResult<Vec<String>> {
        self.gate(path, FsOp::Read)?;
        let resolved = self.resolve(&self.workdir, path)?;
        let mut entries = tokio::fs::read_dir(resolved).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    pub async fn stat(&self, path: &str) -> FacadeResult<Metadata> {
        self.gate(path, FsOp::Read)?;
        let resolved = self.resolve(&self.workdir, path)?;
        let meta = tokio::fs::metadata(resolved).await?;
        Ok(Metadata { is_dir: meta.is_dir(), is_file: meta.is_file(), len: meta.len() })
    }

    pub async fn exists(&self, path: &str) -> FacadeResult<bool> {
        self.gate(path, FsOp::Read)?;
        let resolved = self.resolve(&self.workdir, path)?;
        Ok(tokio::fs::try_exists(resolved).await.unwrap_or(false))
    }

    pub async fn copy(&self, from: &str, to: &str) -> FacadeResult<()> {
        self.gate(from, FsOp::Read)?;
        self.gate(to, FsOp::Write)?;
        let src = self.resolve(&self.workdir, from)?;
        let dst = self.resolve(&self.outdir, to)?;
        if self.dry_run {
            info!(from = %src.display(), to = %dst.display(), "dry-run: would copy");
            return Ok(());
        }
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(src, dst).await?;
        Ok(())
    }

    pub async fn mv(&self, from: &str, to: &str) -> FacadeResult<()> {
        self.gate(from, FsOp::Write)?;
        self.gate(to, FsOp::Write)?;
        let src = self.resolve(&self.outdir, from)?;
        let dst = self.resolve(&self.outdir, to)?;
        if self.dry_run {
            info!(from = %src.display(), to = %dst.display(), "dry-run: would move");
            return Ok(());
        }
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(src, dst).await?;
        Ok(())
    }
}
