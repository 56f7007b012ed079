//! Catalyst hybrids: an alternative key and signature carried in extensions
//! (ITU-T X.509 2019 section 9.8).

use const_oid::ObjectIdentifier;
use der::asn1::BitString;
use der::{Decode, Encode, Sequence};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use tracing::debug;
use x509_cert::certificate::Version;
use x509_cert::ext::Extensions;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Validity;
use x509_cert::{Certificate, TbsCertificate};

use crate::cert::extensions::{find_extension, raw_extension, trust_anchor_extensions, HYBRID_TA_PATH_LEN};
use crate::cert::{names, sign_tbs, verify_signature, CertificateBuilder};
use crate::crypto::{ContentSigner, KeyPair};
use crate::error::Error;
use crate::hybrid::HybridCertificate;
use crate::types::Result;

pub const ID_CE_SUBJECT_ALT_PUBLIC_KEY_INFO: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.5.29.72");
pub const ID_CE_ALT_SIGNATURE_ALGORITHM: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.5.29.73");
pub const ID_CE_ALT_SIGNATURE_VALUE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.5.29.74");

/// `PreTBSCertificate`: the TBS without its `signature` field and without
/// the `altSignatureValue` extension. This is what the alternative key signs.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct PreTbsCertificate {
    #[asn1(context_specific = "0", default = "Default::default")]
    pub version: Version,
    pub serial_number: SerialNumber,
    pub issuer: Name,
    pub validity: Validity,
    pub subject: Name,
    pub subject_public_key_info: SubjectPublicKeyInfoOwned,
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", optional = "true")]
    pub issuer_unique_id: Option<BitString>,
    #[asn1(context_specific = "2", tag_mode = "IMPLICIT", optional = "true")]
    pub subject_unique_id: Option<BitString>,
    #[asn1(context_specific = "3", tag_mode = "EXPLICIT", optional = "true")]
    pub extensions: Option<Extensions>,
}

/// Build a Catalyst trust anchor.
///
/// The alternative signature covers the `PreTBSCertificate`; the primary
/// signature covers the final TBS, alternative key included. All three
/// Catalyst extensions are critical.
pub fn build(
    builder: &CertificateBuilder,
    primary: &KeyPair,
    alternative: &KeyPair,
) -> Result<HybridCertificate> {
    let subject = names::hybrid_name(primary.algorithm(), alternative.algorithm())?;
    let primary_spki = primary.subject_public_key_info()?;
    let alt_spki = alternative.subject_public_key_info()?;
    let alt_algorithm = alternative.algorithm_identifier()?;

    let mut extensions = trust_anchor_extensions(&primary_spki, HYBRID_TA_PATH_LEN)?;
    extensions.push(raw_extension(ID_CE_SUBJECT_ALT_PUBLIC_KEY_INFO, true, alt_spki.to_der()?)?);
    extensions.push(raw_extension(ID_CE_ALT_SIGNATURE_ALGORITHM, true, alt_algorithm.to_der()?)?);

    let mut tbs = builder.tbs(
        subject.clone(),
        subject,
        primary.algorithm_identifier()?,
        primary_spki,
        extensions,
    )?;

    let alt_signature = alternative.sign(&pre_tbs(&tbs).to_der()?)?;
    let value = BitString::from_bytes(&alt_signature)?;
    tbs.extensions
        .get_or_insert_with(Vec::new)
        .push(raw_extension(ID_CE_ALT_SIGNATURE_VALUE, true, value.to_der()?)?);

    let certificate = sign_tbs(tbs, primary)?;
    debug!(
        primary = %primary.algorithm(),
        alternative = %alternative.algorithm(),
        "Built catalyst certificate"
    );

    Ok(HybridCertificate::Catalyst {
        certificate,
        alt_algorithm,
        alt_signature,
    })
}

fn decode_required<T>(tbs: &TbsCertificate, oid: &ObjectIdentifier) -> Result<T>
where
    T: for<'a> Decode<'a>,
{
    let ext = find_extension(tbs, oid)
        .ok_or_else(|| Error::MalformedExtension(format!("Missing extension {}", oid)))?;
    T::from_der(ext.extn_value.as_bytes())
        .map_err(|e| Error::MalformedExtension(format!("{}: {}", oid, e)))
}

/// Alternative public key from `subjectAltPublicKeyInfo`
pub fn alternative_public_key(cert: &Certificate) -> Result<SubjectPublicKeyInfoOwned> {
    decode_required(&cert.tbs_certificate, &ID_CE_SUBJECT_ALT_PUBLIC_KEY_INFO)
}

/// `PreTBSCertificate` of `tbs`, as signed by the alternative key
pub fn pre_tbs(tbs: &TbsCertificate) -> PreTbsCertificate {
    let extensions = tbs.extensions.as_ref().map(|extensions| {
        extensions
            .iter()
            .filter(|ext| ext.extn_id != ID_CE_ALT_SIGNATURE_VALUE)
            .cloned()
            .collect::<Extensions>()
    });

    PreTbsCertificate {
        version: tbs.version,
        serial_number: tbs.serial_number.clone(),
        issuer: tbs.issuer.clone(),
        validity: tbs.validity,
        subject: tbs.subject.clone(),
        subject_public_key_info: tbs.subject_public_key_info.clone(),
        issuer_unique_id: tbs.issuer_unique_id.clone(),
        subject_unique_id: tbs.subject_unique_id.clone(),
        extensions,
    }
}

/// Check the alternative signature against the embedded alternative key
pub fn verify_alternative(cert: &Certificate) -> Result<bool> {
    let tbs = &cert.tbs_certificate;
    let alt_spki = alternative_public_key(cert)?;
    let alt_algorithm: AlgorithmIdentifierOwned = decode_required(tbs, &ID_CE_ALT_SIGNATURE_ALGORITHM)?;
    let alt_value: BitString = decode_required(tbs, &ID_CE_ALT_SIGNATURE_VALUE)?;

    let message = pre_tbs(tbs).to_der()?;
    verify_signature(&alt_algorithm, &alt_spki, &message, alt_value.raw_bytes())
}
