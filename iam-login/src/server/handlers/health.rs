use hyper::{Body, Response, StatusCode};
use std::convert::Infallible;

use super::json_response;
use crate::server::LoginService;

impl LoginService {
    pub async fn handle_health_request(&self) -> Result<Response<Body>, Infallible> {
        let roles = self.roles.role_names().await.len();
        let started_at = self
            .started_at
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_else(|_| std::time::Duration::from_secs(0))
            .as_secs();

        Ok(json_response(
            StatusCode::OK,
            &serde_json::json!({
                "status": "healthy",
                "roles": roles,
                "instance_id": self.server_instance_id.to_string(),
                "started_at": started_at,
            }),
        ))
    }
}
