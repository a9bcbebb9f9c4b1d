use hyper::body::HttpBody;
use hyper::header::CONTENT_LENGTH;
use hyper::{Body, Request, Response, StatusCode};
use std::convert::Infallible;
use tracing::{instrument, warn};
use uuid::Uuid;

use super::json_response;
use crate::common::LoginData;
use crate::server::error::AuthError;
use crate::server::LoginService;

impl LoginService {
    /// `POST /login` with a JSON object of login data.
    ///
    /// Every failure returns the same 401 body; the category only goes to logs.
    #[instrument(skip(self, req), fields(request_id = tracing::field::Empty))]
    pub async fn handle_login_request(
        &self,
        req: Request<Body>,
    ) -> Result<Response<Body>, Infallible> {
        let request_id = Uuid::new_v4();
        tracing::Span::current().record("request_id", tracing::field::display(request_id));

        let declared_len = req
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if declared_len.map_or(false, |len| len > self.max_body_bytes as u64) {
            warn!("Declared login body length exceeds limit");
            return Ok(Self::payload_too_large());
        }

        let body = match read_body_limited(req.into_body(), self.max_body_bytes).await {
            Ok(Some(body)) => body,
            Ok(None) => {
                warn!("Login body exceeds {} bytes", self.max_body_bytes);
                return Ok(Self::payload_too_large());
            }
            Err(e) => {
                warn!("Failed to read login body: {}", e);
                return Ok(Self::login_failed(request_id));
            }
        };

        let login_data: LoginData = match serde_json::from_slice(&body) {
            Ok(data) => data,
            Err(e) => {
                let err = AuthError::malformed(format!("login body is not a JSON object: {}", e));
                warn!(category = %err.category(), "IAM login rejected: {}", err);
                return Ok(Self::login_failed(request_id));
            }
        };

        match self.verifier.login(&login_data).await {
            Ok(outcome) => Ok(json_response(
                StatusCode::OK,
                &serde_json::json!({
                    "request_id": request_id.to_string(),
                    "auth": outcome,
                }),
            )),
            // Already logged with its category by the verifier
            Err(_) => Ok(Self::login_failed(request_id)),
        }
    }

    fn payload_too_large() -> Response<Body> {
        json_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            &serde_json::json!({ "error": "request too large" }),
        )
    }

    fn login_failed(request_id: Uuid) -> Response<Body> {
        json_response(
            StatusCode::UNAUTHORIZED,
            &serde_json::json!({
                "request_id": request_id.to_string(),
                "error": AuthError::PUBLIC_MESSAGE,
            }),
        )
    }
}

/// Read the body, giving up with `None` as soon as it grows past `limit`
async fn read_body_limited(mut body: Body, limit: usize) -> Result<Option<Vec<u8>>, hyper::Error> {
    if body.size_hint().lower() > limit as u64 {
        return Ok(None);
    }

    let mut buf = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk?;
        if buf.len() + chunk.len() > limit {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(Some(buf))
}
