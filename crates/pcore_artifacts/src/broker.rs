//! Content-addressable artifact broker: atomic publish via a
//! temp-write-then-rename dance, content-addressed metadata, and a
//! status model where `ready` is only observable once both the data
//! file and its metadata sidecar exist.

use crate::error::{ArtifactError, ArtifactResult};
use crate::permissions::{check_artifact_read, check_artifact_write};
use crate::uri::ArtifactUri;
use pcore_ids::PluginId;
use pcore_protocol::{ArtifactMeta, ArtifactReadEntry, ArtifactStatus, ArtifactWriteEntry};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub struct WriteOptions {
    pub content_type: String,
    pub encoding: Option<String>,
    pub ttl_ms: Option<u64>,
    pub fail_if_exists: bool,
    /// Semver recorded on the resulting metadata; `list`'s `minVersion`
    /// filter compares against this. Defaults to `0.0.0`.
    pub version: String,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            content_type: "application/octet-stream".into(),
            encoding: None,
            ttl_ms: None,
            fail_if_exists: false,
            version: "0.0.0".into(),
        }
    }
}

pub struct WriteOutcome {
    pub path: PathBuf,
    pub meta: ArtifactMeta,
}

pub struct ArtifactBroker {
    base: PathBuf,
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl ArtifactBroker {
    pub fn new(base: PathBuf) -> Self {
        Self { base }
    }

    fn plugin_dir(&self, plugin_id: &PluginId) -> PathBuf {
        self.base.join(plugin_id.as_str())
    }

    fn data_path(&self, uri: &ArtifactUri) -> PathBuf {
        self.plugin_dir(&uri.plugin_id).join(&uri.logical)
    }

    fn meta_path(&self, uri: &ArtifactUri) -> PathBuf {
        let mut path = self.data_path(uri).into_os_string();
        path.push(".meta.json");
        PathBuf::from(path)
    }

    async fn load_meta(&self, uri: &ArtifactUri) -> ArtifactResult<Option<ArtifactMeta>> {
        let path = self.meta_path(uri);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_meta(&self, uri: &ArtifactUri, meta: &ArtifactMeta) -> ArtifactResult<()> {
        let final_path = self.meta_path(uri);
        let parent = final_path.parent().unwrap_or(Path::new("."));
        tokio::fs::create_dir_all(parent).await?;
        let tmp = tempfile::NamedTempFile::new_in(parent)?;
        tokio::task::spawn_blocking({
            let bytes = serde_json::to_vec_pretty(meta)?;
            let tmp_path = tmp.path().to_path_buf();
            move || -> ArtifactResult<()> {
                std::fs::write(&tmp_path, &bytes)?;
                Ok(())
            }
        })
        .await
        .map_err(|e| ArtifactError::Failed(e.to_string()))??;
        tmp.persist(&final_path).map_err(|e| ArtifactError::Io(e.error))?;
        Ok(())
    }

    fn is_expired(meta: &ArtifactMeta) -> bool {
        matches!(meta.expires_at, Some(expires_at) if now_ms() >= expires_at)
    }

    /// `write({uri, data, contentType?, ttl?, mode?})`.
    pub async fn write(
        &self,
        uri: &ArtifactUri,
        data: &[u8],
        owner: PluginId,
        write_entries: &[ArtifactWriteEntry],
        self_id: &PluginId,
        opts: WriteOptions,
    ) -> ArtifactResult<WriteOutcome> {
        let decision = check_artifact_write(write_entries, &uri.plugin_id, &uri.logical, self_id);
        if !decision.granted {
            return Err(ArtifactError::WriteDenied(
                decision.reason.unwrap_or_else(|| "artifact write denied".into()),
            ));
        }

        let data_path = self.data_path(uri);
        if opts.fail_if_exists && tokio::fs::try_exists(&data_path).await.unwrap_or(false) {
            return Err(ArtifactError::Conflict(uri.to_uri_string()));
        }

        let parent = data_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        tokio::fs::create_dir_all(&parent).await?;

        let sha256 = {
            let mut hasher = Sha256::new();
            hasher.update(data);
            hex_encode(&hasher.finalize())
        };
        let created_at = now_ms();
        let expires_at = opts.ttl_ms.map(|ttl| created_at + ttl);

        let mut meta = ArtifactMeta {
            owner: owner.clone(),
            size: data.len() as u64,
            sha256,
            content_type: opts.content_type.clone(),
            encoding: opts.encoding.clone(),
            version: opts.version.clone(),
            created_at,
            updated_at: created_at,
            status: ArtifactStatus::Pending,
            ttl_ms: opts.ttl_ms,
            expires_at,
        };

        // Publish the pending metadata first so a crash after this
        // point still leaves a consistent (if unready) sidecar.
        if let Err(e) = self.save_meta(uri, &meta).await {
            return Err(e);
        }

        let publish_result: ArtifactResult<()> = async {
            let data_tmp = tempfile::NamedTempFile::new_in(&parent)?;
            let data_bytes = data.to_vec();
            let data_tmp_path = data_tmp.path().to_path_buf();
            tokio::task::spawn_blocking(move || std::fs::write(&data_tmp_path, &data_bytes))
                .await
                .map_err(|e| ArtifactError::Failed(e.to_string()))??;
            data_tmp.persist(&data_path).map_err(|e| ArtifactError::Io(e.error))?;
            Ok(())
        }
        .await;

        if let Err(e) = publish_result {
            meta.status = ArtifactStatus::Failed;
            let _ = self.save_meta(uri, &meta).await;
            return Err(e);
        }

        meta.status = ArtifactStatus::Ready;
        meta.updated_at = now_ms();
        self.save_meta(uri, &meta).await?;

        Ok(WriteOutcome { path: data_path, meta })
    }

    /// `read({uri, accept?})`.
    pub async fn read(
        &self,
        uri: &ArtifactUri,
        read_entries: &[ArtifactReadEntry],
        accept: Option<&[String]>,
        self_id: &PluginId,
    ) -> ArtifactResult<(Vec<u8>, ArtifactMeta)> {
        let decision = check_artifact_read(read_entries, &uri.plugin_id, &uri.logical, accept, self_id);
        if !decision.granted {
            return Err(ArtifactError::ReadDenied(
                decision.reason.unwrap_or_else(|| "artifact read denied".into()),
            ));
        }

        let mut meta = self
            .load_meta(uri)
            .await?
            .ok_or_else(|| ArtifactError::NotFound(uri.to_uri_string()))?;

        if Self::is_expired(&meta) && meta.status != ArtifactStatus::Expired {
            meta.status = ArtifactStatus::Expired;
            let _ = self.save_meta(uri, &meta).await;
        }
        match meta.status {
            ArtifactStatus::Expired => return Err(ArtifactError::Expired(uri.to_uri_string())),
            ArtifactStatus::Failed => return Err(ArtifactError::Failed(uri.to_uri_string())),
            ArtifactStatus::Pending => return Err(ArtifactError::NotFound(uri.to_uri_string())),
            ArtifactStatus::Ready => {}
        }

        let data = tokio::fs::read(self.data_path(uri)).await?;
        Ok((data, meta))
    }

    /// `list({uri})` where the logical path is a glob, optionally
    /// filtered by `status[]` and `minVersion` (§4.3). An entry whose
    /// recorded version fails to parse as semver is excluded once a
    /// `min_version` filter is given, rather than guessed at.
    pub async fn list(
        &self,
        plugin_id: &PluginId,
        pattern: &str,
        status_filter: Option<&[ArtifactStatus]>,
        min_version: Option<&str>,
    ) -> ArtifactResult<Vec<(String, ArtifactMeta)>> {
        let min_version = min_version
            .map(semver::Version::parse)
            .transpose()
            .map_err(|e| ArtifactError::InvalidUri(format!("invalid minVersion: {e}")))?;

        let dir = self.plugin_dir(plugin_id);
        let glob = globset::Glob::new(pattern)
            .map_err(|e| ArtifactError::InvalidUri(e.to_string()))?
            .compile_matcher();

        let mut results = Vec::new();
        let mut stack = vec![dir.clone()];
        while let Some(current) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                let file_name = path.to_string_lossy();
                if file_name.ends_with(".meta.json") || file_name.contains(".tmp") {
                    continue;
                }
                let logical = match path.strip_prefix(&dir) {
                    Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
                    Err(_) => continue,
                };
                if !glob.is_match(&logical) {
                    continue;
                }
                let uri = ArtifactUri { plugin_id: plugin_id.clone(), logical: logical.clone() };
                if let Some(mut meta) = self.load_meta(&uri).await? {
                    if Self::is_expired(&meta) && meta.status != ArtifactStatus::Expired {
                        meta.status = ArtifactStatus::Expired;
                        let _ = self.save_meta(&uri, &meta).await;
                    }
                    let status_ok = status_filter.map(|f| f.contains(&meta.status)).unwrap_or(true);
                    let version_ok = match &min_version {
                        Some(min) => semver::Version::parse(&meta.version).map(|v| v >= *min).unwrap_or(false),
                        None => true,
                    };
                    if status_ok && version_ok {
                        results.push((logical, meta));
                    }
                }
            }
        }
        Ok(results)
    }

    /// `waitForArtifact({uri}, timeoutMs)`: polls every 500ms.
    pub async fn wait_for(&self, uri: &ArtifactUri, timeout_ms: u64) -> ArtifactResult<ArtifactMeta> {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if let Some(meta) = self.load_meta(uri).await? {
                match meta.status {
                    ArtifactStatus::Ready => return Ok(meta),
                    ArtifactStatus::Failed => return Err(ArtifactError::Failed(uri.to_uri_string())),
                    ArtifactStatus::Expired => return Err(ArtifactError::Expired(uri.to_uri_string())),
                    ArtifactStatus::Pending => {}
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ArtifactError::Timeout(uri.to_uri_string()));
            }
            tokio::time::sleep(Duration::from_millis(500).min(deadline - tokio::time::Instant::now())).await;
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcore_protocol::ArtifactOwner;
    use tempfile::tempdir;

    fn self_write_entry() -> Vec<ArtifactWriteEntry> {
        vec![ArtifactWriteEntry { to: ArtifactOwner::SelfOwned, paths: vec!["**".into()] }]
    }

    fn self_read_entry() -> Vec<ArtifactReadEntry> {
        vec![ArtifactReadEntry { from: ArtifactOwner::SelfOwned, paths: vec!["**".into()], allowed_types: None }]
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let broker = ArtifactBroker::new(dir.path().to_path_buf());
        let self_id = PluginId::from("acme/formatter");
        let uri = ArtifactUri::parse("artifact://acme/formatter/out/result.json").unwrap();

        let outcome = broker
            .write(&uri, b"{\"ok\":true}", self_id.clone(), &self_write_entry(), &self_id, WriteOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.meta.status, ArtifactStatus::Ready);

        let (data, meta) = broker.read(&uri, &self_read_entry(), None, &self_id).await.unwrap();
        assert_eq!(data, b"{\"ok\":true}");
        assert_eq!(meta.status, ArtifactStatus::Ready);
    }

    #[tokio::test]
    async fn fail_if_exists_rejects_second_write() {
        let dir = tempdir().unwrap();
        let broker = ArtifactBroker::new(dir.path().to_path_buf());
        let self_id = PluginId::from("acme/formatter");
        let uri = ArtifactUri::parse("artifact://acme/formatter/out/result.json").unwrap();

        broker
            .write(&uri, b"first", self_id.clone(), &self_write_entry(), &self_id, WriteOptions { fail_if_exists: true, ..Default::default() })
            .await
            .unwrap();
        let err = broker
            .write(&uri, b"second", self_id.clone(), &self_write_entry(), &self_id, WriteOptions { fail_if_exists: true, ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, ArtifactError::Conflict(_)));
    }

    #[tokio::test]
    async fn read_without_permission_entry_denied() {
        let dir = tempdir().unwrap();
        let broker = ArtifactBroker::new(dir.path().to_path_buf());
        let self_id = PluginId::from("acme/formatter");
        let uri = ArtifactUri::parse("artifact://acme/formatter/out/result.json").unwrap();
        broker
            .write(&uri, b"data", self_id.clone(), &self_write_entry(), &self_id, WriteOptions::default())
            .await
            .unwrap();
        let err = broker.read(&uri, &[], None, &self_id).await.unwrap_err();
        assert!(matches!(err, ArtifactError::ReadDenied(_)));
    }

    #[tokio::test]
    async fn list_filters_meta_and_temp_files() {
        let dir = tempdir().unwrap();
        let broker = ArtifactBroker::new(dir.path().to_path_buf());
        let self_id = PluginId::from("acme/formatter");
        let uri_a = ArtifactUri::parse("artifact://acme/formatter/out/a.json").unwrap();
        let uri_b = ArtifactUri::parse("artifact://acme/formatter/out/b.json").unwrap();
        broker.write(&uri_a, b"a", self_id.clone(), &self_write_entry(), &self_id, WriteOptions::default()).await.unwrap();
        broker.write(&uri_b, b"b", self_id.clone(), &self_write_entry(), &self_id, WriteOptions::default()).await.unwrap();

        let listed = broker.list(&self_id, "out/*.json", None, None).await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn list_filters_by_min_version() {
        let dir = tempdir().unwrap();
        let broker = ArtifactBroker::new(dir.path().to_path_buf());
        let self_id = PluginId::from("acme/formatter");
        let uri_old = ArtifactUri::parse("artifact://acme/formatter/out/old.json").unwrap();
        let uri_new = ArtifactUri::parse("artifact://acme/formatter/out/new.json").unwrap();
        broker
            .write(
                &uri_old,
                b"old",
                self_id.clone(),
                &self_write_entry(),
                &self_id,
                WriteOptions { version: "1.0.0".into(), ..Default::default() },
            )
            .await
            .unwrap();
        broker
            .write(
                &uri_new,
                b"new",
                self_id.clone(),
                &self_write_entry(),
                &self_id,
                WriteOptions { version: "2.0.0".into(), ..Default::default() },
            )
            .await
            .unwrap();

        let listed = broker.list(&self_id, "out/*.json", None, Some("1.5.0")).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0, "out/new.json");
    }

    #[tokio::test]
    async fn wait_for_returns_immediately_when_ready() {
        let dir = tempdir().unwrap();
        let broker = ArtifactBroker::new(dir.path().to_path_buf());
        let self_id = PluginId::from("acme/formatter");
        let uri = ArtifactUri::parse("artifact://acme/formatter/out/a.json").unwrap();
        broker.write(&uri, b"a", self_id.clone(), &self_write_entry(), &self_id, WriteOptions::default()).await.unwrap();

        let meta = broker.wait_for(&uri, 1000).await.unwrap();
        assert_eq!(meta.status, ArtifactStatus::Ready);
    }

    #[tokio::test]
    async fn wait_for_times_out_when_never_written() {
        let dir = tempdir().unwrap();
        let broker = ArtifactBroker::new(dir.path().to_path_buf());
        let uri = ArtifactUri::parse("artifact://acme/formatter/out/missing.json").unwrap();
        let err = broker.wait_for(&uri, 200).await.unwrap_err();
        assert!(matches!(err, ArtifactError::Timeout(_)));
    }
}
