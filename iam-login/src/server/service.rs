use super::handlers::json_response;
use super::identity::HttpIdentityClient;
use super::roles::{DefaultRoleStore, RoleStore};
use super::verifier::{IamLoginVerifier, LoginVerifier};
use crate::common::config::IamLoginConfig;

use hyper::{Body, Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::instrument;
use uuid::Uuid;

use hyper::Client as HttpClient;
use hyper_tls::HttpsConnector;

#[derive(Clone)]
pub struct LoginService {
    pub server_instance_id: Uuid,
    pub started_at: SystemTime,

    // Verifier for IAM logins
    pub verifier: Arc<dyn LoginVerifier>,
    // Role storage shared with the verifier
    pub roles: Arc<dyn RoleStore>,
    pub max_body_bytes: usize,
}

impl LoginService {
    pub fn new(config: &IamLoginConfig) -> Self {
        let https = HttpsConnector::new();
        let http_client = HttpClient::builder().build::<_, Body>(https);

        let roles: Arc<dyn RoleStore> = Arc::new(DefaultRoleStore::from_roles(config.roles.clone()));
        let verifier = Arc::new(IamLoginVerifier::new(
            &config.identity,
            Arc::new(HttpIdentityClient::new(http_client)),
            roles.clone(),
        ));

        Self::with_verifier(verifier, roles, config.server.max_body_bytes)
    }

    pub fn with_verifier(
        verifier: Arc<dyn LoginVerifier>,
        roles: Arc<dyn RoleStore>,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            server_instance_id: Uuid::new_v4(),
            started_at: SystemTime::now(),
            verifier,
            roles,
            max_body_bytes,
        }
    }

    #[instrument(skip(self, req), fields(method = %req.method(), path = %req.uri().path()))]
    pub async fn handle_request(&self, req: Request<Body>) -> Result<Response<Body>, Infallible> {
        match (req.method(), req.uri().path()) {
            (&Method::POST, "/login") => self.handle_login_request(req).await,
            (&Method::GET, "/health") => self.handle_health_request().await,
            _ => Ok(json_response(
                StatusCode::NOT_FOUND,
                &serde_json::json!({ "error": "not found" }),
            )),
        }
    }
}
