//! Standard extension sets for trust anchors and end entities

use const_oid::{AssociatedOid, ObjectIdentifier};
use der::asn1::OctetString;
use der::{Decode, Encode};
use sha1::{Digest, Sha1};
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{
    AuthorityKeyIdentifier, BasicConstraints, KeyUsage, KeyUsages, SubjectKeyIdentifier,
};
use x509_cert::ext::Extension;
use x509_cert::{Certificate, TbsCertificate};

use crate::error::Error;
use crate::types::Result;

/// Path length constraint for single-algorithm trust anchors
pub const TA_PATH_LEN: u8 = 1;
/// Path length constraint for hybrid trust anchors
pub const HYBRID_TA_PATH_LEN: u8 = 0;

/// DER-encode `value` as an extension under its associated OID
pub fn encode_extension<T>(value: &T, critical: bool) -> Result<Extension>
where
    T: AssociatedOid + Encode,
{
    let der = value
        .to_der()
        .map_err(|e| Error::MalformedExtension(format!("{}: {}", T::OID, e)))?;
    raw_extension(T::OID, critical, der)
}

/// Wrap already-encoded extension contents
pub fn raw_extension(oid: ObjectIdentifier, critical: bool, der: Vec<u8>) -> Result<Extension> {
    Ok(Extension {
        extn_id: oid,
        critical,
        extn_value: OctetString::new(der)
            .map_err(|e| Error::MalformedExtension(format!("{}: {}", oid, e)))?,
    })
}

/// SHA-1 over the subject public key bits (RFC 5280 method 1)
pub fn key_identifier(spki: &SubjectPublicKeyInfoOwned) -> Vec<u8> {
    Sha1::digest(spki.subject_public_key.raw_bytes()).to_vec()
}

/// basicConstraints, keyUsage and subjectKeyIdentifier for a CA
pub fn trust_anchor_extensions(
    spki: &SubjectPublicKeyInfoOwned,
    path_len: u8,
) -> Result<Vec<Extension>> {
    let basic_constraints = BasicConstraints {
        ca: true,
        path_len_constraint: Some(path_len),
    };
    let key_usage = KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign);
    let ski = SubjectKeyIdentifier(OctetString::new(key_identifier(spki))?);

    Ok(vec![
        encode_extension(&basic_constraints, true)?,
        encode_extension(&key_usage, true)?,
        encode_extension(&ski, false)?,
    ])
}

/// Extensions for a KEM end entity issued by `issuer`
pub fn end_entity_extensions(
    spki: &SubjectPublicKeyInfoOwned,
    issuer: &Certificate,
) -> Result<Vec<Extension>> {
    let basic_constraints = BasicConstraints {
        ca: false,
        path_len_constraint: None,
    };
    let key_usage = KeyUsage(KeyUsages::KeyEncipherment.into());
    let ski = SubjectKeyIdentifier(OctetString::new(key_identifier(spki))?);

    let issuer_tbs = &issuer.tbs_certificate;
    let issuer_key_id = match decode_extension::<SubjectKeyIdentifier>(issuer_tbs)? {
        Some(ski) => ski.0.as_bytes().to_vec(),
        None => key_identifier(&issuer_tbs.subject_public_key_info),
    };
    let aki = AuthorityKeyIdentifier {
        key_identifier: Some(OctetString::new(issuer_key_id)?),
        authority_cert_issuer: Some(vec![GeneralName::DirectoryName(issuer_tbs.subject.clone())]),
        authority_cert_serial_number: Some(issuer_tbs.serial_number.clone()),
    };

    Ok(vec![
        encode_extension(&basic_constraints, true)?,
        encode_extension(&key_usage, true)?,
        encode_extension(&ski, false)?,
        encode_extension(&aki, false)?,
    ])
}

/// First extension with `oid`, if any
pub fn find_extension<'a>(tbs: &'a TbsCertificate, oid: &ObjectIdentifier) -> Option<&'a Extension> {
    tbs.extensions
        .as_ref()
        .and_then(|extensions| extensions.iter().find(|ext| ext.extn_id == *oid))
}

/// Decode the extension associated with `T`, if present
pub fn decode_extension<T>(tbs: &TbsCertificate) -> Result<Option<T>>
where
    T: AssociatedOid + for<'a> Decode<'a>,
{
    find_extension(tbs, &T::OID)
        .map(|ext| {
            T::from_der(ext.extn_value.as_bytes())
                .map_err(|e| Error::MalformedExtension(format!("{}: {}", T::OID, e)))
        })
        .transpose()
}
