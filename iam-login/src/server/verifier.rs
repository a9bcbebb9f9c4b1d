use async_trait::async_trait;
use hyper::Uri;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::error::{AuthError, AuthResult, HeaderViolation};
use super::header::validate_server_id_header;
use super::identity::{parse_get_caller_identity_response, IdentityClient};
use super::roles::RoleStore;
use crate::common::config::IdentityConfig;
use crate::common::{
    signed_request_from_login_data, AuthType, IamEntity, LoginData, LoginOutcome,
    SignedRequestDescriptor, LOGIN_ROLE_KEY,
};

/// Service for verifying IAM logins
#[async_trait]
pub trait LoginVerifier: Send + Sync {
    /// Verify a login and resolve it to a configured role
    async fn login(&self, login_data: &LoginData) -> AuthResult<LoginOutcome>;
}

/// Progress of a single login attempt. A failure at any stage rejects the
/// login with the error of that stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
    ReceivedLogin,
    HeaderValidated,
    PayloadBuilt,
    IdentityFetched,
    EntityCanonicalized,
    RoleMatched,
}

impl fmt::Display for LoginStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Default implementation of LoginVerifier
pub struct IamLoginVerifier {
    identity_client: Arc<dyn IdentityClient>,
    roles: Arc<dyn RoleStore>,
    server_id_header_value: Option<String>,
    sts_endpoint: String,
    request_timeout: Duration,
}

impl IamLoginVerifier {
    pub fn new(
        config: &IdentityConfig,
        identity_client: Arc<dyn IdentityClient>,
        roles: Arc<dyn RoleStore>,
    ) -> Self {
        Self {
            identity_client,
            roles,
            server_id_header_value: config.iam_server_id_header_value.clone(),
            sts_endpoint: config.sts_endpoint.clone(),
            request_timeout: config.request_timeout(),
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    async fn verify(
        &self,
        login_data: &LoginData,
        stage: &mut LoginStage,
    ) -> AuthResult<LoginOutcome> {
        let request = signed_request_from_login_data(login_data)?;
        let url: Uri = request
            .url
            .parse()
            .map_err(|e| AuthError::malformed(format!("invalid request URL: {}", e)))?;

        match &self.server_id_header_value {
            Some(expected) => validate_server_id_header(&request.headers, &url, expected)?,
            None => debug!("No server id header value configured, skipping header check"),
        }
        *stage = LoginStage::HeaderValidated;

        validate_replay_request(&request, &url)?;
        let forward = retarget(request, &url, &self.sts_endpoint);
        *stage = LoginStage::PayloadBuilt;

        let body = tokio::time::timeout(
            self.request_timeout,
            self.identity_client.execute_signed_request(&forward),
        )
        .await
        .map_err(|_| {
            AuthError::upstream(format!(
                "identity request timed out after {:?}",
                self.request_timeout
            ))
        })??;
        let response = parse_get_caller_identity_response(&body)?;
        let identity = response.identity();
        *stage = LoginStage::IdentityFetched;

        let entity = IamEntity::parse(&identity.arn)?;
        let canonical_arn = entity.canonical_arn();
        debug!(
            principal_type = entity.principal_type(),
            session = entity.session_info(),
            full_arn = %entity.full_arn(),
            "Canonicalized {} as {}",
            identity.arn,
            canonical_arn
        );
        *stage = LoginStage::EntityCanonicalized;

        // Without an explicit role the principal's own name is used
        let role_name = login_data
            .get(LOGIN_ROLE_KEY)
            .filter(|r| !r.is_empty())
            .cloned()
            .unwrap_or_else(|| entity.friendly_name().to_string());
        tracing::Span::current().record("role", role_name.as_str());

        let role = self
            .roles
            .get_role(&role_name)
            .await
            .ok_or_else(|| AuthError::denied(format!("role {} not found", role_name)))?;
        if role.auth_type != AuthType::Iam {
            return Err(AuthError::denied(format!(
                "role {} does not allow IAM logins",
                role_name
            )));
        }
        if !role.bound_iam_principal_arn.iter().any(|b| *b == canonical_arn) {
            return Err(AuthError::denied(format!(
                "principal {} is not bound to role {}",
                canonical_arn, role_name
            )));
        }
        *stage = LoginStage::RoleMatched;

        Ok(LoginOutcome {
            role: role_name,
            canonical_arn,
            account_id: identity.account.clone(),
            client_arn: identity.arn.clone(),
            client_user_id: identity.user_id.clone(),
        })
    }
}

#[async_trait]
impl LoginVerifier for IamLoginVerifier {
    #[instrument(skip(self, login_data), fields(role = tracing::field::Empty))]
    async fn login(&self, login_data: &LoginData) -> AuthResult<LoginOutcome> {
        let mut stage = LoginStage::ReceivedLogin;
        let result = self.verify(login_data, &mut stage).await;

        match &result {
            Ok(outcome) => info!(
                "IAM login successful for {} (account {})",
                outcome.canonical_arn, outcome.account_id
            ),
            Err(e) => warn!(
                category = %e.category(),
                stage = %stage,
                "IAM login rejected: {}",
                e
            ),
        }
        result
    }
}

/// Only a POST `GetCallerIdentity` call with no query string may be replayed
fn validate_replay_request(request: &SignedRequestDescriptor, url: &Uri) -> AuthResult<()> {
    let disallowed =
        |reason: String| AuthError::security(HeaderViolation::DisallowedRequest { reason });

    if request.method != "POST" {
        return Err(disallowed(format!("method {} is not POST", request.method)));
    }
    if url.query().map(|q| !q.is_empty()).unwrap_or(false) {
        return Err(disallowed("query string is not allowed".to_string()));
    }

    let body = std::str::from_utf8(&request.body)
        .map_err(|_| disallowed("body is not UTF-8".to_string()))?;
    // Keys and values are decoded the way STS decodes them
    let actions: Vec<String> = form_urlencoded::parse(body.as_bytes())
        .filter(|(key, _)| key == "Action")
        .map(|(_, value)| value.into_owned())
        .collect();
    if actions != ["GetCallerIdentity"] {
        return Err(disallowed(format!(
            "expected a single GetCallerIdentity action, got {:?}",
            actions
        )));
    }
    Ok(())
}

/// Replay target is always the configured endpoint; only the caller's path is kept
fn retarget(
    request: SignedRequestDescriptor,
    url: &Uri,
    endpoint: &str,
) -> SignedRequestDescriptor {
    SignedRequestDescriptor {
        url: format!("{}{}", endpoint.trim_end_matches('/'), url.path()),
        ..request
    }
}
