//! Orchestrates a full generation run: trust anchors, end entities, hybrids,
//! then emission.

pub mod artifact;

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;
use x509_cert::Certificate;

use crate::cert::extensions::{end_entity_extensions, trust_anchor_extensions, TA_PATH_LEN};
use crate::cert::{
    names, verify_certificate, CertificateBuilder, TrustAnchor, TrustAnchorRegistry,
    TrustAnchorRegistryBuilder,
};
use crate::config::AlgorithmsConfig;
use crate::crypto::{Algorithm, ContentSigner, KeyPair, SerialNumberAllocator};
use crate::error::Error;
use crate::hybrid::{HybridComposer, HybridStrategy};
use crate::types::{ArtifactKind, Result};

pub use artifact::{Artifact, ArtifactStore, FsArtifactStore, MemoryArtifactStore};

/// `{sigOid}_ta`
pub fn trust_anchor_artifact_name(algorithm: Algorithm) -> String {
    format!("{}_ta", algorithm.oid())
}

/// `{kemOid}_ee`
pub fn end_entity_artifact_name(kem: Algorithm) -> String {
    format!("{}_ee", kem.oid())
}

/// `{strategy}_{classicalSigOid}_with_{pqSigOid}_ta`
pub fn hybrid_artifact_name(strategy: HybridStrategy, classical: Algorithm, pq: Algorithm) -> String {
    format!("{}_{}_with_{}_ta", strategy, classical.oid(), pq.oid())
}

/// What a successful run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub trust_anchors: usize,
    pub end_entities: usize,
    pub hybrids: usize,
    /// Emitted artifact names, sorted
    pub artifacts: Vec<String>,
}

/// Builds every configured certificate and hands the results to a store.
///
/// Builds inside a phase run on the blocking pool. The first failure aborts
/// the run before anything is emitted.
pub struct ArtifactPipeline {
    config: AlgorithmsConfig,
    store: Arc<dyn ArtifactStore>,
    serials: Arc<SerialNumberAllocator>,
}

impl ArtifactPipeline {
    pub fn new(config: AlgorithmsConfig, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            config,
            store,
            serials: Arc::new(SerialNumberAllocator::new()),
        }
    }

    /// Run every phase, then emit all artifacts sorted by name
    pub async fn run(&self) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("certgen_run", %run_id);

        async move {
            info!("Starting artifact generation");

            let (registry, mut artifacts) = self.build_trust_anchors().await?;
            let trust_anchors = artifacts.len();
            info!(count = trust_anchors, "Trust anchors built");

            let end_entity_artifacts = self.build_end_entities(&registry).await?;
            let end_entities = end_entity_artifacts.len();
            artifacts.extend(end_entity_artifacts);
            info!(count = end_entities, "End entities built");

            let classical = self.generate_classical_keys().await?;
            let hybrid_artifacts = self.build_hybrids(&registry, &classical).await?;
            let hybrids = hybrid_artifacts.len();
            artifacts.extend(hybrid_artifacts);
            info!(count = hybrids, "Hybrid trust anchors built");

            artifacts.sort_by(|a, b| a.name.cmp(&b.name));
            if let Some(pair) = artifacts.windows(2).find(|pair| pair[0].name == pair[1].name) {
                return Err(Error::Artifact(format!("Duplicate artifact name {}", pair[0].name)));
            }

            let names: Vec<String> = artifacts.iter().map(|a| a.name.clone()).collect();
            self.publish(artifacts).await?;
            info!(count = names.len(), "Artifacts emitted");

            Ok(RunSummary {
                run_id,
                trust_anchors,
                end_entities,
                hybrids,
                artifacts: names,
            })
        }
        .instrument(span)
        .await
    }

    /// Stage every artifact, then commit; any failure discards the staged set
    async fn publish(&self, artifacts: Vec<Artifact>) -> Result<()> {
        self.store
            .discard()
            .await
            .map_err(Error::building("clearing staged artifacts"))?;

        for artifact in artifacts {
            let name = artifact.name.clone();
            if let Err(err) = self.store.emit(artifact).await {
                if let Err(discard_err) = self.store.discard().await {
                    warn!(error = %discard_err, "Failed to discard staged artifacts");
                }
                return Err(Error::building(format!("artifact {}", name))(err));
            }
        }

        self.store
            .commit()
            .await
            .map_err(Error::building("committing artifacts"))
    }

    fn builder(&self) -> CertificateBuilder {
        CertificateBuilder::new(Arc::clone(&self.serials))
    }

    async fn build_trust_anchors(&self) -> Result<(Arc<TrustAnchorRegistry>, Vec<Artifact>)> {
        let mut tasks = JoinSet::new();
        for &algorithm in &self.config.signature {
            let builder = self.builder();
            tasks.spawn_blocking(move || {
                build_trust_anchor(&builder, algorithm)
                    .map_err(Error::building(format!("{} trust anchor", algorithm)))
            });
        }

        let mut registry = TrustAnchorRegistryBuilder::new();
        let mut artifacts = Vec::new();
        for anchor in join_all(tasks).await? {
            artifacts.push(Artifact::from_certificate(
                trust_anchor_artifact_name(anchor.algorithm()),
                ArtifactKind::TrustAnchor,
                anchor.certificate(),
            )?);
            registry.register(anchor)?;
        }

        Ok((Arc::new(registry.freeze()), artifacts))
    }

    async fn build_end_entities(&self, registry: &Arc<TrustAnchorRegistry>) -> Result<Vec<Artifact>> {
        let mut tasks = JoinSet::new();
        for ee in &self.config.end_entities {
            let (kem, issuer) = (ee.kem, ee.issuer);
            let builder = self.builder();
            let registry = Arc::clone(registry);
            tasks.spawn_blocking(move || {
                let anchor = registry.get(issuer)?;
                let certificate = build_end_entity(&builder, anchor, kem)
                    .map_err(Error::building(format!("{} end entity issued by {}", kem, issuer)))?;
                Artifact::from_certificate(end_entity_artifact_name(kem), ArtifactKind::EndEntity, &certificate)
            });
        }

        join_all(tasks).await
    }

    async fn generate_classical_keys(&self) -> Result<BTreeMap<Algorithm, Arc<KeyPair>>> {
        let mut tasks = JoinSet::new();
        let mut wanted: Vec<Algorithm> = self.config.hybrids.iter().map(|h| h.classical).collect();
        wanted.sort();
        wanted.dedup();

        for algorithm in wanted {
            tasks.spawn_blocking(move || {
                debug!(algorithm = %algorithm, "Generating classical key pair");
                KeyPair::generate(algorithm)
                    .map(|keys| (algorithm, Arc::new(keys)))
                    .map_err(Error::building(format!("{} key pair", algorithm)))
            });
        }

        Ok(join_all(tasks).await?.into_iter().collect())
    }

    async fn build_hybrids(
        &self,
        registry: &Arc<TrustAnchorRegistry>,
        classical: &BTreeMap<Algorithm, Arc<KeyPair>>,
    ) -> Result<Vec<Artifact>> {
        let mut tasks = JoinSet::new();
        for pairing in &self.config.hybrids {
            let (classical_alg, pq_alg) = (pairing.classical, pairing.pq);
            let primary = classical
                .get(&classical_alg)
                .cloned()
                .ok_or_else(|| Error::Internal(format!("No key pair generated for {}", classical_alg)))?;

            for &strategy in &self.config.strategies {
                let composer = HybridComposer::new(self.builder())
                    .with_delta_fields(self.config.chameleon_fields);
                let registry = Arc::clone(registry);
                let primary = Arc::clone(&primary);
                let target = format!("{} {} with {}", strategy, classical_alg, pq_alg);

                tasks.spawn_blocking(move || {
                    let build = || -> Result<Artifact> {
                        let alternative = registry.get(pq_alg)?.key_pair();
                        let hybrid = composer.compose(strategy, &primary, alternative)?;
                        if !hybrid.verify()? {
                            return Err(Error::SignatureFailure(
                                "Hybrid certificate does not satisfy its verification rule".to_string(),
                            ));
                        }
                        Artifact::from_certificate(
                            hybrid_artifact_name(strategy, classical_alg, pq_alg),
                            strategy.artifact_kind(),
                            hybrid.certificate(),
                        )
                    };
                    build().map_err(Error::building(target))
                });
            }
        }

        join_all(tasks).await
    }
}

/// Generate a key and a self-signed trust anchor for it
pub fn build_trust_anchor(builder: &CertificateBuilder, algorithm: Algorithm) -> Result<TrustAnchor> {
    let key_pair = KeyPair::generate(algorithm)?;
    let spki = key_pair.subject_public_key_info()?;
    let extensions = trust_anchor_extensions(&spki, TA_PATH_LEN)?;
    let certificate = builder.build_self_signed(names::trust_anchor_name(algorithm)?, &key_pair, extensions)?;

    ensure_verifies(&certificate, &spki)?;
    debug!(algorithm = %algorithm, "Built trust anchor");
    Ok(TrustAnchor::new(key_pair, certificate))
}

/// Generate a KEM key and an end entity certificate for it under `anchor`
pub fn build_end_entity(builder: &CertificateBuilder, anchor: &TrustAnchor, kem: Algorithm) -> Result<Certificate> {
    let key_pair = KeyPair::generate(kem)?;
    let spki = key_pair.subject_public_key_info()?;
    let extensions = end_entity_extensions(&spki, anchor.certificate())?;
    let certificate = builder.build_signed(
        anchor.certificate(),
        anchor.key_pair(),
        names::end_entity_name(kem)?,
        spki,
        extensions,
    )?;

    ensure_verifies(&certificate, &anchor.certificate().tbs_certificate.subject_public_key_info)?;
    debug!(kem = %kem, issuer = %anchor.algorithm(), "Built end entity");
    Ok(certificate)
}

fn ensure_verifies(certificate: &Certificate, issuer_spki: &spki::SubjectPublicKeyInfoOwned) -> Result<()> {
    if verify_certificate(certificate, issuer_spki)? {
        Ok(())
    } else {
        Err(Error::SignatureFailure(format!(
            "Signature on {} does not verify",
            certificate.tbs_certificate.subject
        )))
    }
}

/// Wait for every task; the first error wins and drops the rest
async fn join_all<T: 'static>(mut tasks: JoinSet<Result<T>>) -> Result<Vec<T>> {
    let mut results = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        results.push(joined??);
    }
    Ok(results)
}
