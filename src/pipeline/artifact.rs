use async_trait::async_trait;
use bytes::Bytes;
use der::pem::LineEnding;
use der::{Decode, Encode, EncodePem};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::debug;
use x509_cert::Certificate;

use crate::error::Error;
use crate::types::{ArtifactKind, OutputFormat, Result};
use crate::utils::FsUtils;

/// A named certificate ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// File-system safe name without extension
    pub name: String,
    pub kind: ArtifactKind,
    /// DER encoded certificate
    pub der: Bytes,
}

impl Artifact {
    pub fn from_certificate(name: impl Into<String>, kind: ArtifactKind, certificate: &Certificate) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            kind,
            der: Bytes::from(certificate.to_der()?),
        })
    }

    /// Decode the carried certificate
    pub fn certificate(&self) -> Result<Certificate> {
        Ok(Certificate::from_der(&self.der)?)
    }

    /// PEM armored `CERTIFICATE`
    pub fn to_pem(&self) -> Result<String> {
        Ok(self.certificate()?.to_pem(LineEnding::LF)?)
    }
}

/// Destination for generated artifacts.
///
/// Emitted artifacts are staged; they become visible on `commit` and are
/// dropped by `discard`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stage one artifact
    async fn emit(&self, artifact: Artifact) -> Result<()>;

    /// Publish everything staged
    async fn commit(&self) -> Result<()>;

    /// Drop everything staged
    async fn discard(&self) -> Result<()>;
}

/// Writes `{name}.pem` or `{name}.der` files into a directory.
///
/// Files are written to `{dir}.staging` and moved into `dir` on commit.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
    format: OutputFormat,
}

impl FsArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    /// Path an artifact ends up at after commit
    pub fn path_for(&self, artifact: &Artifact) -> PathBuf {
        self.dir.join(self.file_name(artifact))
    }

    pub fn staging_dir(&self) -> PathBuf {
        let mut staging = self.dir.as_os_str().to_owned();
        staging.push(".staging");
        PathBuf::from(staging)
    }

    fn file_name(&self, artifact: &Artifact) -> String {
        format!("{}.{}", artifact.name, self.format.extension())
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn emit(&self, artifact: Artifact) -> Result<()> {
        if artifact.name.is_empty() || artifact.name.contains(|c: char| c == '/' || c == '\\') {
            return Err(Error::Artifact(format!("Invalid artifact name: {:?}", artifact.name)));
        }

        let path = self.staging_dir().join(self.file_name(&artifact));
        match self.format {
            OutputFormat::Pem => FsUtils::write_file(&path, artifact.to_pem()?).await?,
            OutputFormat::Der => FsUtils::write_file(&path, &artifact.der).await?,
        }

        debug!(artifact = %artifact.name, kind = %artifact.kind, path = %path.display(), "Staged artifact");
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let staging = self.staging_dir();
        FsUtils::ensure_dir_exists(&self.dir).await?;
        if !staging.exists() {
            return Ok(());
        }

        for staged in FsUtils::list_dir(&staging).await? {
            let file_name = staged
                .file_name()
                .ok_or_else(|| Error::Artifact(format!("Unexpected staging entry {}", staged.display())))?;
            FsUtils::move_file(&staged, self.dir.join(file_name)).await?;
        }
        FsUtils::remove_dir_all(&staging).await?;

        debug!(dir = %self.dir.display(), "Committed artifacts");
        Ok(())
    }

    async fn discard(&self) -> Result<()> {
        FsUtils::remove_dir_all(self.staging_dir()).await
    }
}

/// Keeps committed artifacts in memory
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    staged: Mutex<Vec<Artifact>>,
    artifacts: Mutex<Vec<Artifact>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything committed so far, in emission order
    pub async fn artifacts(&self) -> Vec<Artifact> {
        self.artifacts.lock().await.clone()
    }

    pub async fn get(&self, name: &str) -> Option<Artifact> {
        self.artifacts
            .lock()
            .await
            .iter()
            .find(|artifact| artifact.name == name)
            .cloned()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn emit(&self, artifact: Artifact) -> Result<()> {
        self.staged.lock().await.push(artifact);
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let staged = std::mem::take(&mut *self.staged.lock().await);
        self.artifacts.lock().await.extend(staged);
        Ok(())
    }

    async fn discard(&self) -> Result<()> {
        self.staged.lock().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::{common_name, CertificateBuilder};
    use crate::crypto::{Algorithm, KeyPair, SerialNumberAllocator};
    use der::DecodePem;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn artifact(name: &str) -> Artifact {
        let builder = CertificateBuilder::new(Arc::new(SerialNumberAllocator::new()));
        let keys = KeyPair::generate(Algorithm::EcdsaP256Sha256).unwrap();
        let cert = builder
            .build_self_signed(common_name("Artifact TA").unwrap(), &keys, Vec::new())
            .unwrap();
        Artifact::from_certificate(name, ArtifactKind::TrustAnchor, &cert).unwrap()
    }

    #[tokio::test]
    async fn test_fs_store_writes_pem() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("certs"), OutputFormat::Pem);
        let artifact = artifact("1.2.840.10045.4.3.2_ta");

        store.emit(artifact.clone()).await.unwrap();
        store.commit().await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("certs/1.2.840.10045.4.3.2_ta.pem")).unwrap();
        assert!(written.starts_with("-----BEGIN CERTIFICATE-----"));
        let parsed = Certificate::from_pem(written.as_bytes()).unwrap();
        assert_eq!(parsed, artifact.certificate().unwrap());
    }

    #[tokio::test]
    async fn test_fs_store_writes_der() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path(), OutputFormat::Der);
        let artifact = artifact("der_ta");

        store.emit(artifact.clone()).await.unwrap();
        store.commit().await.unwrap();

        let written = std::fs::read(store.path_for(&artifact)).unwrap();
        assert_eq!(written, artifact.der.to_vec());
        assert!(store.path_for(&artifact).ends_with("der_ta.der"));
    }

    #[tokio::test]
    async fn test_fs_store_rejects_path_names() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path(), OutputFormat::Pem);

        let err = store.emit(artifact("../escape")).await.unwrap_err();
        assert!(matches!(err, Error::Artifact(_)));
    }

    #[tokio::test]
    async fn test_fs_store_stages_until_commit() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("certs"), OutputFormat::Pem);
        let artifact = artifact("staged_ta");

        store.emit(artifact.clone()).await.unwrap();
        assert!(!store.path_for(&artifact).exists());
        assert!(store.staging_dir().join("staged_ta.pem").exists());

        store.commit().await.unwrap();
        assert!(store.path_for(&artifact).exists());
        assert!(!store.staging_dir().exists());
    }

    #[tokio::test]
    async fn test_fs_store_discard_leaves_output_untouched() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("certs");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("previous.pem"), "kept").unwrap();
        let store = FsArtifactStore::new(&out, OutputFormat::Pem);

        store.emit(artifact("previous")).await.unwrap();
        store.emit(artifact("new_ta")).await.unwrap();
        store.discard().await.unwrap();

        assert!(!store.staging_dir().exists());
        assert_eq!(std::fs::read_to_string(out.join("previous.pem")).unwrap(), "kept");
        assert!(!out.join("new_ta.pem").exists());
    }

    #[tokio::test]
    async fn test_memory_store_keeps_order() {
        let store = MemoryArtifactStore::new();
        store.emit(artifact("b")).await.unwrap();
        store.emit(artifact("a")).await.unwrap();
        assert!(store.artifacts().await.is_empty());
        store.commit().await.unwrap();

        let names: Vec<_> = store.artifacts().await.into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert!(store.get("a").await.is_some());
        assert!(store.get("c").await.is_none());

        store.emit(artifact("c")).await.unwrap();
        store.discard().await.unwrap();
        store.commit().await.unwrap();
        assert!(store.get("c").await.is_none());
    }
}
