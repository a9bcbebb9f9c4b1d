use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use thiserror::Error;

use super::types::{LoginData, RequestHeaders, SignedRequestDescriptor};

/// Login data key holding the HTTP method of the signed request
pub const LOGIN_METHOD_KEY: &str = "iam_http_request_method";
/// Login data key holding the base64 URL of the signed request
pub const LOGIN_URL_KEY: &str = "iam_request_url";
/// Login data key holding the base64 body of the signed request
pub const LOGIN_BODY_KEY: &str = "iam_request_body";
/// Login data key holding the base64 JSON headers of the signed request
pub const LOGIN_HEADERS_KEY: &str = "iam_request_headers";
/// Login data key holding the requested role
pub const LOGIN_ROLE_KEY: &str = "role";

/// Errors while encoding or decoding login data
#[derive(Error, Debug)]
pub enum LoginDataError {
    #[error("signed request has no headers")]
    NoHeaders,

    #[error("signed request has no absolute URL: {url}")]
    NoUrl { url: String },

    #[error("header {name} has a non-UTF-8 value")]
    InvalidHeaderValue { name: String },

    #[error("missing login field {field}")]
    MissingField { field: &'static str },

    #[error("field {field} is not valid base64: {source}")]
    Base64 {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("field {field} is not valid UTF-8")]
    Utf8 { field: &'static str },

    #[error("request headers are not a JSON object of strings or string lists: {source}")]
    HeaderJson {
        #[from]
        source: serde_json::Error,
    },
}

/// Capture a signed STS request as login data.
///
/// Nothing is re-encoded beyond the base64 transport wrapping: STS re-checks
/// the caller's signature against these bytes when the server replays them.
pub fn build_caller_identity_login_data(
    request: &hyper::Request<Vec<u8>>,
    role: Option<&str>,
) -> Result<LoginData, LoginDataError> {
    if request.headers().is_empty() {
        return Err(LoginDataError::NoHeaders);
    }

    let uri = request.uri();
    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(LoginDataError::NoUrl {
            url: uri.to_string(),
        });
    }

    let mut headers = RequestHeaders::new();
    for (name, value) in request.headers() {
        let value = value
            .to_str()
            .map_err(|_| LoginDataError::InvalidHeaderValue {
                name: name.to_string(),
            })?;
        headers
            .entry(name.as_str().to_string())
            .or_default()
            .push(value.to_string());
    }
    let headers_json = serde_json::to_vec(&headers)?;

    let mut data = LoginData::new();
    data.insert(
        LOGIN_METHOD_KEY.to_string(),
        request.method().as_str().to_string(),
    );
    data.insert(LOGIN_URL_KEY.to_string(), STANDARD.encode(uri.to_string()));
    data.insert(LOGIN_BODY_KEY.to_string(), STANDARD.encode(request.body()));
    data.insert(LOGIN_HEADERS_KEY.to_string(), STANDARD.encode(headers_json));
    if let Some(role) = role.filter(|r| !r.is_empty()) {
        data.insert(LOGIN_ROLE_KEY.to_string(), role.to_string());
    }

    Ok(data)
}

/// A header value in transported JSON: clients may send one string or a list
#[derive(Deserialize)]
#[serde(untagged)]
enum EncodedHeaderValue {
    Many(Vec<String>),
    One(String),
}

impl From<EncodedHeaderValue> for Vec<String> {
    fn from(value: EncodedHeaderValue) -> Self {
        match value {
            EncodedHeaderValue::Many(values) => values,
            EncodedHeaderValue::One(value) => vec![value],
        }
    }
}

/// Decode base64 JSON request headers into name -> list of values
pub fn parse_request_headers(encoded: &str) -> Result<RequestHeaders, LoginDataError> {
    let json = decode_field(LOGIN_HEADERS_KEY, encoded)?;
    let raw: std::collections::BTreeMap<String, EncodedHeaderValue> =
        serde_json::from_slice(&json)?;

    Ok(raw
        .into_iter()
        .map(|(name, value)| (name, value.into()))
        .collect())
}

/// Rebuild the signed request a client captured with
/// [`build_caller_identity_login_data`]. The method defaults to POST.
pub fn signed_request_from_login_data(
    data: &LoginData,
) -> Result<SignedRequestDescriptor, LoginDataError> {
    let method = data
        .get(LOGIN_METHOD_KEY)
        .filter(|m| !m.is_empty())
        .cloned()
        .unwrap_or_else(|| "POST".to_string());

    let url = decode_field(LOGIN_URL_KEY, required(data, LOGIN_URL_KEY)?)?;
    let url = String::from_utf8(url).map_err(|_| LoginDataError::Utf8 {
        field: LOGIN_URL_KEY,
    })?;
    let body = decode_field(LOGIN_BODY_KEY, required(data, LOGIN_BODY_KEY)?)?;
    let headers = parse_request_headers(required(data, LOGIN_HEADERS_KEY)?)?;

    Ok(SignedRequestDescriptor {
        method,
        url,
        headers,
        body,
    })
}

fn required<'a>(data: &'a LoginData, field: &'static str) -> Result<&'a str, LoginDataError> {
    data.get(field)
        .map(String::as_str)
        .ok_or(LoginDataError::MissingField { field })
}

fn decode_field(field: &'static str, encoded: &str) -> Result<Vec<u8>, LoginDataError> {
    STANDARD
        .decode(encoded)
        .map_err(|source| LoginDataError::Base64 { field, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(value: serde_json::Value) -> String {
        STANDARD.encode(serde_json::to_vec(&value).unwrap())
    }

    fn expected_headers() -> RequestHeaders {
        let mut headers = RequestHeaders::new();
        headers.insert("Header1".to_string(), vec!["Value1".to_string()]);
        headers.insert("Header2".to_string(), vec!["Value2".to_string()]);
        headers
    }

    #[test]
    fn test_parse_list_valued_headers() {
        let encoded = encode(json!({
            "Header1": ["Value1"],
            "Header2": ["Value2"],
        }));
        assert_eq!(parse_request_headers(&encoded).unwrap(), expected_headers());
    }

    #[test]
    fn test_parse_mixed_valued_headers() {
        let encoded = encode(json!({
            "Header1": "Value1",
            "Header2": ["Value2"],
        }));
        assert_eq!(parse_request_headers(&encoded).unwrap(), expected_headers());
    }

    #[test]
    fn test_parse_headers_rejects_bad_encodings() {
        assert!(matches!(
            parse_request_headers("not base64!!"),
            Err(LoginDataError::Base64 { .. })
        ));
        assert!(matches!(
            parse_request_headers(&STANDARD.encode("not json")),
            Err(LoginDataError::HeaderJson { .. })
        ));
        assert!(matches!(
            parse_request_headers(&encode(json!({ "Header1": 42 }))),
            Err(LoginDataError::HeaderJson { .. })
        ));
        assert!(matches!(
            parse_request_headers(&encode(json!(["Header1"]))),
            Err(LoginDataError::HeaderJson { .. })
        ));
    }

    fn signed_request() -> hyper::Request<Vec<u8>> {
        hyper::Request::builder()
            .method("POST")
            .uri("https://sts.amazonaws.com/")
            .header("content-type", "application/x-www-form-urlencoded; charset=utf-8")
            .header("x-iam-server-id", "login.example.com")
            .header("x-amz-date", "20150830T123600Z")
            .header(
                "authorization",
                "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/sts/aws4_request, SignedHeaders=content-type;host;x-amz-date;x-iam-server-id, Signature=abc",
            )
            .body(b"Action=GetCallerIdentity&Version=2011-06-15".to_vec())
            .unwrap()
    }

    #[test]
    fn test_login_data_carries_request_verbatim() {
        let data = build_caller_identity_login_data(&signed_request(), Some("dev")).unwrap();

        assert_eq!(data[LOGIN_METHOD_KEY], "POST");
        assert_eq!(data[LOGIN_ROLE_KEY], "dev");

        let replay = signed_request_from_login_data(&data).unwrap();
        assert_eq!(replay.method, "POST");
        assert_eq!(replay.url, "https://sts.amazonaws.com/");
        assert_eq!(replay.body, b"Action=GetCallerIdentity&Version=2011-06-15");
        assert_eq!(
            replay.header_values("X-IAM-Server-ID"),
            vec!["login.example.com"]
        );
        assert_eq!(replay.headers.len(), 4);
    }

    #[test]
    fn test_login_data_without_role() {
        let data = build_caller_identity_login_data(&signed_request(), None).unwrap();
        assert!(!data.contains_key(LOGIN_ROLE_KEY));
    }

    #[test]
    fn test_login_data_requires_headers_and_url() {
        let bare = hyper::Request::builder()
            .method("POST")
            .uri("https://sts.amazonaws.com/")
            .body(Vec::new())
            .unwrap();
        assert!(matches!(
            build_caller_identity_login_data(&bare, None),
            Err(LoginDataError::NoHeaders)
        ));

        let relative = hyper::Request::builder()
            .method("POST")
            .uri("/")
            .header("host", "sts.amazonaws.com")
            .body(Vec::new())
            .unwrap();
        assert!(matches!(
            build_caller_identity_login_data(&relative, None),
            Err(LoginDataError::NoUrl { .. })
        ));
    }

    #[test]
    fn test_missing_login_fields() {
        let mut data = build_caller_identity_login_data(&signed_request(), None).unwrap();
        data.remove(LOGIN_METHOD_KEY);
        assert_eq!(signed_request_from_login_data(&data).unwrap().method, "POST");

        data.remove(LOGIN_BODY_KEY);
        assert!(matches!(
            signed_request_from_login_data(&data),
            Err(LoginDataError::MissingField {
                field: LOGIN_BODY_KEY
            })
        ));
    }
}
