use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Body, Client as HttpClient, Method, Request};
use hyper_tls::HttpsConnector;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use tracing::{debug, warn};

use super::error::{AuthError, AuthResult};
use crate::common::SignedRequestDescriptor;

/// Body of an STS `GetCallerIdentity` response.
///
/// STS always returns one result; it is kept as a list to mirror the wire
/// schema.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetCallerIdentityResponse {
    pub get_caller_identity_result: Vec<GetCallerIdentityResult>,
    pub response_metadata: ResponseMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetCallerIdentityResult {
    pub arn: String,
    pub user_id: String,
    pub account: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseMetadata {
    pub request_id: String,
}

impl GetCallerIdentityResponse {
    /// The single identity result
    pub fn identity(&self) -> &GetCallerIdentityResult {
        &self.get_caller_identity_result[0]
    }
}

/// Decode the XML body STS returns for `GetCallerIdentity`
pub fn parse_get_caller_identity_response(xml: &str) -> AuthResult<GetCallerIdentityResponse> {
    let root = root_element_name(xml)?;
    if root != ROOT_ELEMENT {
        return Err(AuthError::malformed(format!(
            "expected {} document, got {}",
            ROOT_ELEMENT, root
        )));
    }

    let response: GetCallerIdentityResponse = quick_xml::de::from_str(xml)
        .map_err(|e| AuthError::malformed(format!("invalid GetCallerIdentity response: {}", e)))?;

    if response.get_caller_identity_result.is_empty() {
        return Err(AuthError::malformed(
            "GetCallerIdentity response has no result",
        ));
    }
    Ok(response)
}

const ROOT_ELEMENT: &str = "GetCallerIdentityResponse";

/// Local name of the document's root element
fn root_element_name(xml: &str) -> AuthResult<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // Skip the XML declaration, comments and whitespace
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = e.local_name();
                return std::str::from_utf8(name.as_ref())
                    .map(str::to_string)
                    .map_err(|_| AuthError::malformed("root element name is not UTF-8"));
            }
            Ok(Event::Eof) => {
                return Err(AuthError::malformed(
                    "GetCallerIdentity response has no root element",
                ))
            }
            Ok(_) => {}
            Err(e) => {
                return Err(AuthError::malformed(format!(
                    "invalid GetCallerIdentity response: {}",
                    e
                )))
            }
        }
    }
}

/// Sends a caller-signed request to the identity service
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Send the request exactly as signed and return the response body
    async fn execute_signed_request(&self, request: &SignedRequestDescriptor)
        -> AuthResult<String>;
}

/// Default implementation of IdentityClient
pub struct HttpIdentityClient {
    http_client: HttpClient<HttpsConnector<HttpConnector>>,
}

impl HttpIdentityClient {
    pub fn new(http_client: HttpClient<HttpsConnector<HttpConnector>>) -> Self {
        Self { http_client }
    }

    fn build_request(request: &SignedRequestDescriptor) -> AuthResult<Request<Body>> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| AuthError::malformed(format!("invalid method {:?}", request.method)))?;

        let mut builder = Request::builder().method(method).uri(request.url.as_str());
        for (name, values) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| AuthError::malformed(format!("invalid header name {:?}", name)))?;
            for value in values {
                let value = HeaderValue::from_str(value).map_err(|_| {
                    AuthError::malformed(format!("invalid value for header {}", name))
                })?;
                builder = builder.header(&name, value);
            }
        }

        builder
            .body(Body::from(request.body.clone()))
            .map_err(|e| AuthError::malformed(format!("invalid signed request: {}", e)))
    }
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    async fn execute_signed_request(
        &self,
        request: &SignedRequestDescriptor,
    ) -> AuthResult<String> {
        let http_request = Self::build_request(request)?;
        debug!("Forwarding signed identity request to {}", request.url);

        let resp = self
            .http_client
            .request(http_request)
            .await
            .map_err(|e| AuthError::upstream(format!("identity request failed: {}", e)))?;

        let status = resp.status();
        let body = hyper::body::to_bytes(resp.into_body())
            .await
            .map_err(|e| AuthError::upstream(format!("reading identity response: {}", e)))?;
        let body = String::from_utf8_lossy(&body).into_owned();

        if !status.is_success() {
            warn!("Identity service returned non-success status: {}", status);
            debug!("Identity service error body: {}", body);
            return Err(AuthError::upstream(format!(
                "identity service returned status {}",
                status
            )));
        }

        Ok(body)
    }
}
