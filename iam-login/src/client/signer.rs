use anyhow::{anyhow, Result};
use aws_credential_types::Credentials;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use hyper::Uri;
use sha2::{Digest, Sha256};

use crate::server::header::IAM_SERVER_ID_HEADER;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "sts";
const GET_CALLER_IDENTITY_BODY: &str = "Action=GetCallerIdentity&Version=2011-06-15";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// AWS credentials used to sign the identity request
#[derive(Clone)]
pub struct SigningCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl From<&Credentials> for SigningCredentials {
    fn from(creds: &Credentials) -> Self {
        Self {
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: creds.secret_access_key().to_string(),
            session_token: creds.session_token().map(|s| s.to_string()),
        }
    }
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &self.session_token.as_ref().map(|_| "** redacted **"))
            .finish()
    }
}

/// Sign a `POST GetCallerIdentity` request with SigV4 header authentication.
///
/// When `server_id` is given it is sent as `X-IAM-Server-ID` and included in
/// the signed headers.
pub fn sign_get_caller_identity_request(
    creds: &SigningCredentials,
    region: &str,
    endpoint: &str,
    server_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<hyper::Request<Vec<u8>>> {
    let uri: Uri = endpoint.parse()?;
    let scheme = uri
        .scheme_str()
        .ok_or_else(|| anyhow!("STS endpoint {} has no scheme", endpoint))?;
    let host = uri
        .authority()
        .ok_or_else(|| anyhow!("STS endpoint {} has no host", endpoint))?
        .as_str();
    let path = if uri.path().is_empty() { "/" } else { uri.path() };

    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = &amz_date[..8];

    // Lowercase names, kept sorted for the canonical request
    let mut headers: Vec<(String, String)> = vec![
        ("content-type".to_string(), FORM_CONTENT_TYPE.to_string()),
        ("host".to_string(), host.to_string()),
        ("x-amz-date".to_string(), amz_date.clone()),
    ];
    if let Some(token) = &creds.session_token {
        headers.push(("x-amz-security-token".to_string(), token.clone()));
    }
    if let Some(value) = server_id {
        headers.push((IAM_SERVER_ID_HEADER.to_ascii_lowercase(), value.to_string()));
    }
    headers.sort();

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");
    let payload_hash = hex::encode(Sha256::digest(GET_CALLER_IDENTITY_BODY.as_bytes()));
    let canonical_request = format!(
        "POST\n{}\n\n{}\n{}\n{}",
        path, canonical_headers, signed_headers, payload_hash
    );

    // String to sign
    let scope = format!("{}/{}/{}/aws4_request", date_stamp, region, SERVICE);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let signing_key = derive_signing_key(&creds.secret_access_key, date_stamp, region, SERVICE)?;
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

    let authorization = format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, creds.access_key_id, scope, signed_headers, signature
    );

    let mut builder = hyper::Request::builder()
        .method("POST")
        .uri(format!("{}://{}{}", scheme, host, path));
    for (name, value) in &headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    let request = builder
        .header("authorization", authorization)
        .body(GET_CALLER_IDENTITY_BODY.as_bytes().to_vec())?;

    Ok(request)
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Derive the SigV4 signing key for a date, region and service
pub fn derive_signing_key(
    secret_key: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>> {
    let k_date = hmac_sha256(format!("AWS4{}", secret_key).as_bytes(), date_stamp.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}
