pub mod builder;
pub mod extensions;
pub mod names;
pub mod registry;
pub mod verify;

// Re-export key types
pub use builder::{common_name, sign_tbs, CertificateBuilder};
pub use registry::{TrustAnchor, TrustAnchorRegistry, TrustAnchorRegistryBuilder};
pub use verify::{verify_certificate, verify_signature};
