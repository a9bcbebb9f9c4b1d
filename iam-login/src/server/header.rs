use regex::Regex;
use std::sync::OnceLock;

use super::error::HeaderViolation;
use crate::common::RequestHeaders;

/// Header a caller must send, and sign, with the server's configured value
pub const IAM_SERVER_ID_HEADER: &str = "X-IAM-Server-ID";

fn signed_headers_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:^|[,\s])SignedHeaders=([^,\s]+)").expect("static regex")
    })
}

/// Every value sent under `name` in any letter case, joined with `,`
fn joined_values(headers: &RequestHeaders, name: &str) -> Option<String> {
    let values: Vec<&str> = headers
        .iter()
        .filter(|(key, _)| key.eq_ignore_ascii_case(name))
        .flat_map(|(_, values)| values.iter().map(String::as_str))
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join(","))
    }
}

/// Check that a signed request carries `X-IAM-Server-ID` with the expected
/// value and that the header is listed in the signature's `SignedHeaders`.
///
/// The signature itself is verified by STS when the request is replayed.
pub fn validate_server_id_header(
    headers: &RequestHeaders,
    request_url: &hyper::Uri,
    expected_value: &str,
) -> Result<(), HeaderViolation> {
    let provided = joined_values(headers, IAM_SERVER_ID_HEADER)
        .filter(|v| !v.is_empty())
        .ok_or(HeaderViolation::MissingServerId {
            header: IAM_SERVER_ID_HEADER,
        })?;
    if provided != expected_value {
        return Err(HeaderViolation::ServerIdMismatch {
            header: IAM_SERVER_ID_HEADER,
            provided,
            expected: expected_value.to_string(),
        });
    }

    // Only header-signed requests are accepted
    if request_url
        .query()
        .map(|q| {
            q.split('&')
                .any(|p| p.split('=').next() == Some("X-Amz-Signature"))
        })
        .unwrap_or(false)
    {
        return Err(HeaderViolation::QuerySigned);
    }

    // Transports may split Authorization into several values
    let authorization = joined_values(headers, "Authorization")
        .ok_or(HeaderViolation::MissingAuthorization)?;
    // The last component wins, as STS reads it
    let signed_headers = signed_headers_pattern()
        .captures_iter(&authorization)
        .last()
        .and_then(|c| c.get(1))
        .ok_or(HeaderViolation::NoSignedHeaders)?
        .as_str();

    if signed_headers
        .split(';')
        .any(|h| h.eq_ignore_ascii_case(IAM_SERVER_ID_HEADER))
    {
        Ok(())
    } else {
        Err(HeaderViolation::UnsignedServerId {
            header: IAM_SERVER_ID_HEADER,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER_ID: &str = "Login-Server";
    const SIGNED_AUTHZ: &str = "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/iam/aws4_request, SignedHeaders=content-type;host;x-amz-date;x-iam-server-id, Signature=5d672d79c15b13162d9279b0855cfba6789a8edb4c82c400e06b5924a6f2b5d7";
    const UNSIGNED_AUTHZ: &str = "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/iam/aws4_request, SignedHeaders=content-type;host;x-amz-date, Signature=5d672d79c15b13162d9279b0855cfba6789a8edb4c82c400e06b5924a6f2b5d7";

    fn headers(entries: &[(&str, Vec<&str>)]) -> RequestHeaders {
        entries
            .iter()
            .map(|(name, values)| {
                (
                    name.to_string(),
                    values.iter().map(|v| v.to_string()).collect(),
                )
            })
            .collect()
    }

    fn sts_url() -> hyper::Uri {
        "https://sts.amazonaws.com/".parse().unwrap()
    }

    #[test]
    fn test_missing_server_id_header() {
        let h = headers(&[("Host", vec!["Foo"]), ("Authorization", vec![SIGNED_AUTHZ])]);
        assert_eq!(
            validate_server_id_header(&h, &sts_url(), SERVER_ID),
            Err(HeaderViolation::MissingServerId {
                header: IAM_SERVER_ID_HEADER
            })
        );
    }

    #[test]
    fn test_wrong_server_id_value() {
        let h = headers(&[
            ("Host", vec!["Foo"]),
            (IAM_SERVER_ID_HEADER, vec!["InvalidValue"]),
            ("Authorization", vec![SIGNED_AUTHZ]),
        ]);
        assert!(matches!(
            validate_server_id_header(&h, &sts_url(), SERVER_ID),
            Err(HeaderViolation::ServerIdMismatch { .. })
        ));
    }

    #[test]
    fn test_unsigned_server_id_header() {
        let h = headers(&[
            ("Host", vec!["Foo"]),
            (IAM_SERVER_ID_HEADER, vec![SERVER_ID]),
            ("Authorization", vec![UNSIGNED_AUTHZ]),
        ]);
        assert_eq!(
            validate_server_id_header(&h, &sts_url(), SERVER_ID),
            Err(HeaderViolation::UnsignedServerId {
                header: IAM_SERVER_ID_HEADER
            })
        );
    }

    #[test]
    fn test_valid_request() {
        let h = headers(&[
            ("Host", vec!["Foo"]),
            (IAM_SERVER_ID_HEADER, vec![SERVER_ID]),
            ("Authorization", vec![SIGNED_AUTHZ]),
        ]);
        assert_eq!(validate_server_id_header(&h, &sts_url(), SERVER_ID), Ok(()));
    }

    #[test]
    fn test_header_names_are_case_insensitive() {
        let h = headers(&[
            ("x-iam-server-id", vec![SERVER_ID]),
            ("authorization", vec![SIGNED_AUTHZ]),
        ]);
        assert_eq!(validate_server_id_header(&h, &sts_url(), SERVER_ID), Ok(()));
    }

    #[test]
    fn test_case_variant_server_id_entries_are_merged() {
        let h = headers(&[
            (IAM_SERVER_ID_HEADER, vec![SERVER_ID]),
            ("x-iam-server-id", vec!["Other-Server"]),
            (
                "Authorization",
                vec!["AWS4-HMAC-SHA256 Credential=A, SignedHeaders=host;x-iam-server-id, Signature=00"],
            ),
        ]);
        assert_eq!(
            validate_server_id_header(&h, &sts_url(), SERVER_ID),
            Err(HeaderViolation::ServerIdMismatch {
                header: IAM_SERVER_ID_HEADER,
                provided: "Login-Server,Other-Server".to_string(),
                expected: SERVER_ID.to_string(),
            })
        );
    }

    #[test]
    fn test_case_variant_authorization_entries_are_merged() {
        let h = headers(&[
            (IAM_SERVER_ID_HEADER, vec![SERVER_ID]),
            ("AUTHORIZATION", vec![SIGNED_AUTHZ]),
            ("authorization", vec![UNSIGNED_AUTHZ]),
        ]);
        assert_eq!(
            validate_server_id_header(&h, &sts_url(), SERVER_ID),
            Err(HeaderViolation::UnsignedServerId {
                header: IAM_SERVER_ID_HEADER
            })
        );
    }

    #[test]
    fn test_signed_headers_inside_credential_is_ignored() {
        let h = headers(&[
            (IAM_SERVER_ID_HEADER, vec![SERVER_ID]),
            (
                "Authorization",
                vec!["AWS4-HMAC-SHA256 Credential=AKID/SignedHeaders=x-iam-server-id/20150830/us-east-1/sts/aws4_request, SignedHeaders=content-type;host, Signature=00"],
            ),
        ]);
        assert_eq!(
            validate_server_id_header(&h, &sts_url(), SERVER_ID),
            Err(HeaderViolation::UnsignedServerId {
                header: IAM_SERVER_ID_HEADER
            })
        );

        let h = headers(&[
            (IAM_SERVER_ID_HEADER, vec![SERVER_ID]),
            (
                "Authorization",
                vec!["AWS4-HMAC-SHA256 Credential=AKID,SignedHeaders=x-iam-server-id/20150830/us-east-1/sts/aws4_request, SignedHeaders=content-type;host, Signature=00"],
            ),
        ]);
        assert!(matches!(
            validate_server_id_header(&h, &sts_url(), SERVER_ID),
            Err(HeaderViolation::UnsignedServerId { .. })
        ));
    }

    #[test]
    fn test_split_authorization_header() {
        let h = headers(&[
            ("Host", vec!["Foo"]),
            (IAM_SERVER_ID_HEADER, vec![SERVER_ID]),
            (
                "Authorization",
                vec![
                    "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/iam/aws4_request",
                    "SignedHeaders=content-type;host;x-amz-date;x-iam-server-id, Signature=5d672d79c15b13162d9279b0855cfba6789a8edb4c82c400e06b5924a6f2b5d7",
                ],
            ),
        ]);
        assert_eq!(validate_server_id_header(&h, &sts_url(), SERVER_ID), Ok(()));
    }

    #[test]
    fn test_missing_authorization() {
        let h = headers(&[(IAM_SERVER_ID_HEADER, vec![SERVER_ID])]);
        assert_eq!(
            validate_server_id_header(&h, &sts_url(), SERVER_ID),
            Err(HeaderViolation::MissingAuthorization)
        );

        let h = headers(&[
            (IAM_SERVER_ID_HEADER, vec![SERVER_ID]),
            ("Authorization", vec!["AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE"]),
        ]);
        assert_eq!(
            validate_server_id_header(&h, &sts_url(), SERVER_ID),
            Err(HeaderViolation::NoSignedHeaders)
        );
    }

    #[test]
    fn test_server_id_name_must_match_whole_entry() {
        let h = headers(&[
            (IAM_SERVER_ID_HEADER, vec![SERVER_ID]),
            (
                "Authorization",
                vec!["AWS4-HMAC-SHA256 Credential=A, SignedHeaders=host;x-iam-server-id-extra, Signature=00"],
            ),
        ]);
        assert!(matches!(
            validate_server_id_header(&h, &sts_url(), SERVER_ID),
            Err(HeaderViolation::UnsignedServerId { .. })
        ));
    }

    #[test]
    fn test_query_signed_request_rejected() {
        let h = headers(&[
            (IAM_SERVER_ID_HEADER, vec![SERVER_ID]),
            ("Authorization", vec![SIGNED_AUTHZ]),
        ]);
        let url: hyper::Uri =
            "https://sts.amazonaws.com/?Action=GetCallerIdentity&X-Amz-Signature=abc"
                .parse()
                .unwrap();
        assert_eq!(
            validate_server_id_header(&h, &url, SERVER_ID),
            Err(HeaderViolation::QuerySigned)
        );
    }
}
