//! Certificate helpers for cluster TLS trust.

use std::error::Error as StdError;

use chrono::DateTime;
use dcos_common::checksum::sha256_fingerprint;
use x509_parser::pem::Pem;

/// A decoded X.509 certificate, kept in DER form alongside the fields the
/// trust prompt shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaCertificate {
    pub der: Vec<u8>,
    pub issuer: String,
    pub not_before: i64,
    pub not_after: i64,
}

impl CaCertificate {
    /// SHA-256 fingerprint of the DER encoding, `AB:CD:...` style.
    pub fn fingerprint(&self) -> String {
        sha256_fingerprint(&self.der)
    }

    pub fn valid_from(&self) -> String {
        format_timestamp(self.not_before)
    }

    pub fn valid_until(&self) -> String {
        format_timestamp(self.not_after)
    }
}

/// Decode every `CERTIFICATE` block in a PEM bundle.
///
/// Blocks with another label or an unparsable body are skipped; decoding
/// stops at the first malformed PEM framing.
pub fn decode_pem_certificates(data: &[u8]) -> Vec<CaCertificate> {
    let mut certs = Vec::new();
    for pem in Pem::iter_from_buffer(data) {
        let Ok(pem) = pem else {
            break;
        };
        if pem.label != "CERTIFICATE" {
            continue;
        }
        let Ok(cert) = pem.parse_x509() else {
            continue;
        };
        certs.push(CaCertificate {
            der: pem.contents.clone(),
            issuer: cert.issuer().to_string(),
            not_before: cert.validity().not_before.timestamp(),
            not_after: cert.validity().not_after.timestamp(),
        });
    }
    certs
}

/// Whether an error chain bottoms out in a certificate signed by an
/// authority the client does not trust.
///
/// Only this specific condition lets cluster setup fall back to fetching the
/// cluster CA; every other TLS failure is fatal.
pub fn is_unknown_authority(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(err) = current {
        if is_unknown_issuer(err) {
            return true;
        }
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if let Some(inner) = io.get_ref() {
                if is_unknown_issuer(inner) {
                    return true;
                }
            }
        }
        current = err.source();
    }
    false
}

fn is_unknown_issuer(err: &(dyn StdError + 'static)) -> bool {
    matches!(
        err.downcast_ref::<rustls::Error>(),
        Some(rustls::Error::InvalidCertificate(
            rustls::CertificateError::UnknownIssuer
        ))
    )
}

fn format_timestamp(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}
