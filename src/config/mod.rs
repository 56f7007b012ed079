use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::crypto::Algorithm;
use crate::error::Error;
use crate::hybrid::{DeltaFields, HybridStrategy};
use crate::types::{OutputFormat, Result};

/// Environment variable naming the YAML configuration file
pub const CONFIG_PATH_ENV: &str = "PQSECURE_CERTGEN_CONFIG";

/// Main configuration structure for the artifact generator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where and how artifacts are written
    pub output: OutputConfig,

    /// Logging configuration
    pub telemetry: TelemetryConfig,

    /// Which certificates to generate
    pub algorithms: AlgorithmsConfig,
}

/// Artifact output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output directory, created if missing
    pub dir: PathBuf,

    /// PEM or DER
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("artifacts_certs_r3"),
            format: OutputFormat::Pem,
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// trace, debug, info, warn or error
    pub log_level: String,

    /// Emit JSON log lines
    pub structured_logging: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            structured_logging: false,
        }
    }
}

/// A KEM end entity and the trust anchor that issues it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndEntityConfig {
    pub kem: Algorithm,
    pub issuer: Algorithm,
}

/// A classical/post-quantum pairing for hybrid trust anchors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HybridConfig {
    pub classical: Algorithm,
    pub pq: Algorithm,
}

/// Algorithm selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgorithmsConfig {
    /// One trust anchor per entry
    pub signature: Vec<Algorithm>,

    /// KEM end entities
    pub end_entities: Vec<EndEntityConfig>,

    /// Hybrid pairings, each built with every strategy
    pub hybrids: Vec<HybridConfig>,

    /// Hybrid strategies to run
    pub strategies: Vec<HybridStrategy>,

    /// Fields a Chameleon delta may differ in
    pub chameleon_fields: DeltaFields,
}

impl Default for AlgorithmsConfig {
    fn default() -> Self {
        Self {
            signature: vec![
                Algorithm::Dilithium2,
                Algorithm::Dilithium3,
                Algorithm::Dilithium5,
                Algorithm::Sphincs128fSha2,
                Algorithm::Sphincs128sSha2,
                Algorithm::Sphincs192fSha2,
                Algorithm::Sphincs192sSha2,
                Algorithm::Sphincs256fSha2,
                Algorithm::Sphincs256sSha2,
                Algorithm::Sphincs128fShake,
                Algorithm::Sphincs128sShake,
                Algorithm::Sphincs192fShake,
                Algorithm::Sphincs192sShake,
                Algorithm::Sphincs256fShake,
                Algorithm::Sphincs256sShake,
            ],
            end_entities: vec![
                EndEntityConfig {
                    kem: Algorithm::Kyber512,
                    issuer: Algorithm::Dilithium2,
                },
                EndEntityConfig {
                    kem: Algorithm::Kyber768,
                    issuer: Algorithm::Dilithium3,
                },
                EndEntityConfig {
                    kem: Algorithm::Kyber1024,
                    issuer: Algorithm::Dilithium5,
                },
            ],
            hybrids: vec![
                HybridConfig {
                    classical: Algorithm::RsaSha256,
                    pq: Algorithm::Dilithium2,
                },
                HybridConfig {
                    classical: Algorithm::EcdsaP256Sha256,
                    pq: Algorithm::Dilithium2,
                },
                HybridConfig {
                    classical: Algorithm::EcdsaP521Sha512,
                    pq: Algorithm::Dilithium5,
                },
            ],
            strategies: HybridStrategy::ALL.to_vec(),
            chameleon_fields: DeltaFields::default(),
        }
    }
}

/// Load configuration from file and environment variables
pub fn load_config() -> Result<Config> {
    // 1. Config file is optional; defaults reproduce the full artifact set
    let mut config = match env::var(CONFIG_PATH_ENV) {
        Ok(path) => load_config_file(&path)?,
        Err(_) => {
            debug!("{} not set, using default configuration", CONFIG_PATH_ENV);
            Config::default()
        }
    };

    // 2. Override with environment variables if present
    apply_env_overrides(&mut config, |key| env::var(key).ok())?;

    // 3. Validate configuration
    validate_config(&config)?;

    info!("Configuration loaded successfully");
    Ok(config)
}

/// Read and parse a YAML configuration file
pub fn load_config_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    debug!("Loading configuration from {}", path.display());

    let config_str = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

    Ok(serde_yaml::from_str(&config_str)?)
}

/// Apply environment variable overrides to configuration
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup("PQSECURE_OUTPUT_DIR") {
        config.output.dir = PathBuf::from(dir);
    }

    if let Some(format) = lookup("PQSECURE_OUTPUT_FORMAT") {
        config.output.format = format.parse()?;
    }

    if let Some(level) = lookup("PQSECURE_LOG_LEVEL") {
        config.telemetry.log_level = level;
    }

    Ok(())
}

/// Validate configuration values
pub fn validate_config(config: &Config) -> Result<()> {
    // Validate output configuration
    if config.output.dir.as_os_str().is_empty() {
        return Err(Error::Config("Output directory cannot be empty".to_string()));
    }

    // Validate telemetry configuration
    match config.telemetry.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        other => return Err(Error::Config(format!("Unknown log level: {}", other))),
    }

    // Validate algorithm selection
    let algorithms = &config.algorithms;
    if algorithms.signature.is_empty() {
        return Err(Error::Config("At least one signature algorithm is required".to_string()));
    }

    let mut anchors = HashSet::new();
    for alg in &algorithms.signature {
        if !alg.is_signature() {
            return Err(Error::Config(format!("{} is not a signature algorithm", alg)));
        }
        if !anchors.insert(*alg) {
            return Err(Error::Config(format!("Duplicate trust anchor algorithm: {}", alg)));
        }
    }

    let mut kems = HashSet::new();
    for ee in &algorithms.end_entities {
        if !kems.insert(ee.kem) {
            return Err(Error::Config(format!("Duplicate end entity KEM: {}", ee.kem)));
        }
        if ee.kem.is_signature() {
            return Err(Error::Config(format!("{} is not a KEM", ee.kem)));
        }
        if !anchors.contains(&ee.issuer) {
            return Err(Error::Config(format!(
                "End entity {} is issued by {} which has no trust anchor",
                ee.kem, ee.issuer
            )));
        }
    }

    let mut pairings = HashSet::new();
    for hybrid in &algorithms.hybrids {
        if !pairings.insert((hybrid.classical, hybrid.pq)) {
            return Err(Error::Config(format!(
                "Duplicate hybrid pairing: {} with {}",
                hybrid.classical, hybrid.pq
            )));
        }
        if !hybrid.classical.is_signature() || hybrid.classical.is_post_quantum() {
            return Err(Error::Config(format!(
                "{} is not a classical signature algorithm",
                hybrid.classical
            )));
        }
        if !hybrid.pq.is_post_quantum() || !anchors.contains(&hybrid.pq) {
            return Err(Error::Config(format!(
                "Hybrid post-quantum algorithm {} needs a post-quantum trust anchor",
                hybrid.pq
            )));
        }
    }

    if algorithms.strategies.is_empty() {
        return Err(Error::Config("At least one hybrid strategy must be enabled".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_matches_full_artifact_set() {
        let config = Config::default();
        validate_config(&config).unwrap();

        assert_eq!(config.algorithms.signature.len(), 15);
        assert_eq!(config.algorithms.end_entities.len(), 3);
        assert_eq!(config.algorithms.hybrids.len(), 3);
        assert_eq!(config.algorithms.strategies.len(), 3);
        assert_eq!(config.output.dir, PathBuf::from("artifacts_certs_r3"));
        assert_eq!(
            config.algorithms.hybrids[2],
            HybridConfig {
                classical: Algorithm::EcdsaP521Sha512,
                pq: Algorithm::Dilithium5,
            }
        );
    }

    #[test]
    fn test_load_valid_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("certgen.yaml");

        let config_content = r#"
output:
  dir: "./out"
  format: der
telemetry:
  log_level: debug
  structured_logging: true
algorithms:
  signature: [dilithium2, sphincsplus-sha2-128f]
  end_entities:
    - kem: kyber512
      issuer: dilithium2
  hybrids:
    - classical: ecdsa-p256-sha256
      pq: dilithium2
  strategies: [composite]
"#;

        let mut file = File::create(&config_path).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let config = load_config_file(&config_path).unwrap();
        validate_config(&config).unwrap();

        assert_eq!(config.output.format, OutputFormat::Der);
        assert!(config.telemetry.structured_logging);
        assert_eq!(
            config.algorithms.signature,
            vec![Algorithm::Dilithium2, Algorithm::Sphincs128fSha2]
        );
        assert_eq!(config.algorithms.strategies, vec![HybridStrategy::Composite]);
        // omitted sections fall back to defaults
        assert_eq!(config.algorithms.chameleon_fields, DeltaFields::default());
    }

    #[test]
    fn test_unknown_algorithm_is_rejected() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("certgen.yaml");
        std::fs::write(&config_path, "algorithms:\n  signature: [falcon512]\n").unwrap();

        let err = load_config_file(&config_path).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PQSECURE_OUTPUT_DIR", "/tmp/certs"),
            ("PQSECURE_OUTPUT_FORMAT", "DER"),
            ("PQSECURE_LOG_LEVEL", "warn"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.output.dir, PathBuf::from("/tmp/certs"));
        assert_eq!(config.output.format, OutputFormat::Der);
        assert_eq!(config.telemetry.log_level, "warn");
    }

    #[test]
    fn test_validation_failures() {
        let mut config = Config::default();
        config.algorithms.end_entities[0].issuer = Algorithm::RsaSha256;
        assert!(matches!(validate_config(&config), Err(Error::Config(_))));

        let mut config = Config::default();
        config.algorithms.hybrids[0].classical = Algorithm::Dilithium3;
        assert!(matches!(validate_config(&config), Err(Error::Config(_))));

        let mut config = Config::default();
        config.algorithms.signature.push(Algorithm::Kyber512);
        assert!(matches!(validate_config(&config), Err(Error::Config(_))));

        let mut config = Config::default();
        config.algorithms.strategies.clear();
        assert!(matches!(validate_config(&config), Err(Error::Config(_))));

        let mut config = Config::default();
        config.telemetry.log_level = "loud".to_string();
        assert!(matches!(validate_config(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_repeated_end_entity_kem_is_rejected() {
        let mut config = Config::default();
        config.algorithms.end_entities = vec![
            EndEntityConfig {
                kem: Algorithm::Kyber512,
                issuer: Algorithm::Dilithium2,
            },
            EndEntityConfig {
                kem: Algorithm::Kyber512,
                issuer: Algorithm::Dilithium3,
            },
        ];

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("Duplicate end entity KEM"), "{}", err);
    }

    #[test]
    fn test_repeated_hybrid_pairing_is_rejected() {
        let mut config = Config::default();
        let pairing = config.algorithms.hybrids[0].clone();
        config.algorithms.hybrids.push(pairing);

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("Duplicate hybrid pairing"), "{}", err);

        // same classical algorithm with a different PQ partner is a distinct artifact
        let mut config = Config::default();
        config.algorithms.hybrids.push(HybridConfig {
            classical: Algorithm::RsaSha256,
            pq: Algorithm::Dilithium5,
        });
        validate_config(&config).unwrap();
    }
}
