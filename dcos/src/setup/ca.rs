//! Establishing trust in a cluster's certificate authority.

use anyhow::{Context, Result, bail};
use reqwest::StatusCode;

use crate::config::Tls;
use crate::error::HttpError;
use crate::httpclient::{HttpClient, HttpOptions, error_from_response};
use crate::prompt::Prompt;
use crate::tls::{CaCertificate, decode_pem_certificates};

/// Where clusters serve their root CA bundle.
pub const CA_BUNDLE_PATH: &str = "/ca/dcos-ca.crt";

/// Fetch the cluster's CA bundle.
///
/// No trust exists yet at this point, so certificate verification is off.
pub fn download_ca_bundle(options: &HttpOptions) -> Result<Vec<u8>, HttpError> {
    let client = HttpClient::new(options.clone().with_tls(Tls::insecure()))?;
    let resp = client.get(CA_BUNDLE_PATH)?;
    if resp.status() != StatusCode::OK {
        return Err(error_from_response(resp));
    }
    let url = resp.url().to_string();
    let bytes = resp
        .bytes()
        .map_err(|source| HttpError::Decode { url, source })?;
    Ok(bytes.to_vec())
}

/// The text shown before asking whether to trust `cert`.
pub fn describe_ca(cert: &CaCertificate) -> String {
    format!(
        "Cluster Certificate Authority:\n\n  Issuer: {}\n\n  Validity:\n    From:  {}\n    Until: {}\n\n  SHA256 fingerprint: {}\n\nDo you trust it?",
        cert.issuer,
        cert.valid_from(),
        cert.valid_until(),
        cert.fingerprint(),
    )
}

/// Turn a PEM bundle into TLS settings, optionally asking the user to
/// confirm the first certificate.
pub fn trust_bundle(bundle: &[u8], prompt: Option<&dyn Prompt>) -> Result<Tls> {
    let certs = decode_pem_certificates(bundle);
    let Some(first) = certs.first() else {
        bail!("couldn't find any certificate in the CA bundle");
    };

    if let Some(prompt) = prompt {
        let trusted = prompt
            .confirm(&describe_ca(first), false)
            .context("couldn't read confirmation")?;
        if !trusted {
            bail!("the cluster certificate authority was not trusted");
        }
    }

    Ok(Tls {
        insecure: false,
        root_ca_pem: Some(bundle.to_vec()),
        root_ca_path: None,
    })
}
