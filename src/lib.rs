//! PQSecure CertGen - post-quantum and hybrid X.509 test artifact generator
//!
//! Builds trust anchors for post-quantum signature algorithms, KEM end
//! entities issued by them, and Catalyst, Composite and Chameleon hybrid
//! trust anchors pairing a classical key with a post-quantum one.

// Foundational layer
pub mod error;
pub mod types;
pub mod utils;
pub mod config;
pub mod telemetry;

// Core layer
pub mod crypto;
pub mod cert;
pub mod hybrid;

// Application layer
pub mod pipeline;

// Public key types
pub use crate::error::Error;
pub use crate::types::{ArtifactKind, OutputFormat, Result};
pub use crate::crypto::{Algorithm, ContentSigner, KeyPair, SerialNumberAllocator};
pub use crate::cert::{CertificateBuilder, TrustAnchorRegistry};
pub use crate::hybrid::{HybridCertificate, HybridComposer, HybridStrategy};
pub use crate::pipeline::{Artifact, ArtifactPipeline, ArtifactStore, FsArtifactStore, MemoryArtifactStore};
