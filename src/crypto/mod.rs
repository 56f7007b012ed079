pub mod algorithm;
pub mod keys;
pub mod provider;
pub mod serial;

// Re-export key types
pub use algorithm::{Algorithm, AlgorithmCategory, AlgorithmInfo};
pub use keys::{ContentSigner, KeyPair};
pub use serial::SerialNumberAllocator;
