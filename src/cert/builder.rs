use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use const_oid::db::rfc4519::CN;
use der::asn1::{BitString, SetOfVec, UtcTime};
use der::{Any, Encode, Tag};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use tracing::debug;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::ext::Extension;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::time::{Time, Validity};
use x509_cert::{Certificate, TbsCertificate, Version};

use crate::crypto::{ContentSigner, SerialNumberAllocator};
use crate::error::Error;
use crate::types::Result;

/// Backdating applied to `notBefore`
pub const NOT_BEFORE_SKEW: Duration = Duration::from_secs(60);
/// Lifetime of every generated certificate
pub const VALIDITY_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Name with a single UTF8String commonName
pub fn common_name(cn: &str) -> Result<Name> {
    let value = Any::new(Tag::Utf8String, cn.as_bytes())?;
    let atv = AttributeTypeAndValue { oid: CN, value };
    let rdn = RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?);
    Ok(RdnSequence(vec![rdn]))
}

/// Builds and signs version 3 certificates.
///
/// All certificates from one builder share the validity window derived from
/// `issued_at`.
#[derive(Debug, Clone)]
pub struct CertificateBuilder {
    serials: Arc<SerialNumberAllocator>,
    issued_at: SystemTime,
}

impl CertificateBuilder {
    pub fn new(serials: Arc<SerialNumberAllocator>) -> Self {
        Self {
            serials,
            issued_at: SystemTime::now(),
        }
    }

    /// Pin the issuance instant
    pub fn with_issued_at(mut self, issued_at: SystemTime) -> Self {
        self.issued_at = issued_at;
        self
    }

    pub fn issued_at(&self) -> SystemTime {
        self.issued_at
    }

    /// `[issued_at - 60s, issued_at + 365d]`
    pub fn validity(&self) -> Result<Validity> {
        let since_epoch = self
            .issued_at
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::Certificate(format!("Issuance time before Unix epoch: {}", e)))?;
        let not_before = since_epoch.saturating_sub(NOT_BEFORE_SKEW);
        let not_after = since_epoch + VALIDITY_PERIOD;

        Ok(Validity {
            not_before: Time::UtcTime(UtcTime::from_unix_duration(not_before)?),
            not_after: Time::UtcTime(UtcTime::from_unix_duration(not_after)?),
        })
    }

    /// Assemble an unsigned TBS with a fresh serial number
    pub fn tbs(
        &self,
        issuer: Name,
        subject: Name,
        signature: AlgorithmIdentifierOwned,
        subject_public_key_info: SubjectPublicKeyInfoOwned,
        extensions: Vec<Extension>,
    ) -> Result<TbsCertificate> {
        Ok(TbsCertificate {
            version: Version::V3,
            serial_number: self.serials.next()?,
            signature,
            issuer,
            validity: self.validity()?,
            subject,
            subject_public_key_info,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: if extensions.is_empty() { None } else { Some(extensions) },
        })
    }

    /// Self-signed certificate for the signer's own key
    pub fn build_self_signed(
        &self,
        subject: Name,
        signer: &dyn ContentSigner,
        extensions: Vec<Extension>,
    ) -> Result<Certificate> {
        let tbs = self.tbs(
            subject.clone(),
            subject,
            signer.algorithm_identifier()?,
            signer.subject_public_key_info()?,
            extensions,
        )?;
        sign_tbs(tbs, signer)
    }

    /// Certificate for `subject_public_key_info` issued by `issuer`
    pub fn build_signed(
        &self,
        issuer: &Certificate,
        issuer_signer: &dyn ContentSigner,
        subject: Name,
        subject_public_key_info: SubjectPublicKeyInfoOwned,
        extensions: Vec<Extension>,
    ) -> Result<Certificate> {
        let tbs = self.tbs(
            issuer.tbs_certificate.subject.clone(),
            subject,
            issuer_signer.algorithm_identifier()?,
            subject_public_key_info,
            extensions,
        )?;
        sign_tbs(tbs, issuer_signer)
    }
}

/// Sign the DER encoding of `tbs`; the outer algorithm mirrors the TBS one
pub fn sign_tbs(tbs: TbsCertificate, signer: &dyn ContentSigner) -> Result<Certificate> {
    let tbs_der = tbs.to_der()?;
    let signature = signer.sign(&tbs_der)?;
    debug!(
        subject = %tbs.subject,
        signature_len = signature.len(),
        "Signed certificate"
    );

    Ok(Certificate {
        signature_algorithm: tbs.signature.clone(),
        signature: BitString::from_bytes(&signature)?,
        tbs_certificate: tbs,
    })
}
