use anyhow::Result;
use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use std::convert::Infallible;
use std::net::SocketAddr;

use crate::commands::ServerCommand;
use crate::common::config::IamLoginConfig;
pub use service::LoginService;
use tracing::{info, warn};

pub mod error;
mod handlers;
pub mod header;
pub mod identity;
pub mod roles;
mod service;
pub mod verifier;

pub async fn run(args: ServerCommand, mut config: IamLoginConfig) -> Result<()> {
    if let Some(port) = args.port {
        config.server.listen_port = port;
    }
    if let Some(value) = args.header_value {
        config.identity.iam_server_id_header_value = Some(value);
    }
    if let Some(endpoint) = args.sts_endpoint {
        config.identity.sts_endpoint = endpoint;
    }

    info!("🚀 Starting IAM login server");
    info!("📡 STS endpoint: {}", config.identity.sts_endpoint);
    info!("⏱️  STS request timeout: {}s", config.identity.request_timeout);
    info!("🔑 Roles configured: {}", config.roles.len());
    if config.identity.iam_server_id_header_value.is_none() {
        warn!(
            "No {} value configured; signed requests are not bound to this server",
            header::IAM_SERVER_ID_HEADER
        );
    }

    let service = LoginService::new(&config);
    let make_svc = make_service_fn(move |_conn| {
        let service = service.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let service = service.clone();
                async move { service.handle_request(req).await }
            }))
        }
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.listen_port));
    let server = Server::try_bind(&addr)?.serve(make_svc);

    info!("🌐 Login server listening on {}", addr);

    server.await?;
    Ok(())
}
