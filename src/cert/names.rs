//! Subject names used for generated certificates

use x509_cert::name::Name;

use crate::cert::builder::common_name;
use crate::crypto::Algorithm;
use crate::types::Result;

/// Prefix of every generated common name
pub const NAME_PREFIX: &str = "PQSecure";

pub fn trust_anchor_name(algorithm: Algorithm) -> Result<Name> {
    common_name(&format!("{} {} Test TA", NAME_PREFIX, algorithm.display_name()))
}

pub fn end_entity_name(algorithm: Algorithm) -> Result<Name> {
    common_name(&format!("{} {} Test EE", NAME_PREFIX, algorithm.display_name()))
}

/// Catalyst and composite trust anchors
pub fn hybrid_name(primary: Algorithm, alternative: Algorithm) -> Result<Name> {
    common_name(&format!(
        "{} {} with {} Test TA",
        NAME_PREFIX,
        primary.display_name(),
        alternative.display_name()
    ))
}

/// Chameleon base certificate
pub fn chameleon_outer_name(primary: Algorithm) -> Result<Name> {
    common_name(&format!("{} {} Test Chameleon Outer TA", NAME_PREFIX, primary.display_name()))
}

/// Chameleon delta certificate
pub fn chameleon_inner_name(alternative: Algorithm) -> Result<Name> {
    common_name(&format!(
        "{} {} Test Chameleon Inner TA",
        NAME_PREFIX,
        alternative.display_name()
    ))
}
