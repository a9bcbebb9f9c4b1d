use anyhow::{anyhow, Result};
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_sts::config::ProvideCredentials;
use aws_sdk_sts::Client as StsClient;
use chrono::Utc;
use hyper::{Body, Client, Method, Request};
use hyper_tls::HttpsConnector;
use tracing::{debug, info, warn};

use crate::commands::LoginCommand;
use crate::common::build_caller_identity_login_data;
use aws::AwsService;
use signer::{sign_get_caller_identity_request, SigningCredentials};

mod aws;
pub mod signer;

pub async fn run(args: LoginCommand) -> Result<()> {
    info!("🚀 Starting IAM login");
    info!("📡 Login server: {}", args.server_url);
    info!("🌍 STS endpoint: {} ({})", args.sts_endpoint, args.sts_region);

    let region_provider = RegionProviderChain::default_provider().or_else("us-east-1");
    let cfg = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(region_provider)
        .load()
        .await;

    if args.skip_preflight {
        warn!("⚠️  Skipping STS preflight check");
    } else {
        let aws_service = AwsService::new(StsClient::new(&cfg));
        let arn = aws_service.validate_caller_identity().await?;
        println!("🔑 Logging in as {}", arn);
    }

    let creds = cfg
        .credentials_provider()
        .ok_or_else(|| anyhow!("No AWS credentials provider available"))?
        .provide_credentials()
        .await?;
    let creds = SigningCredentials::from(&creds);
    debug!(access_key = %creds.access_key_id, "Resolved AWS credentials");

    let signed = sign_get_caller_identity_request(
        &creds,
        &args.sts_region,
        &args.sts_endpoint,
        args.header_value.as_deref(),
        Utc::now(),
    )?;
    let login_data = build_caller_identity_login_data(&signed, args.role.as_deref())?;

    let login_url = format!("{}/login", args.server_url.trim_end_matches('/'));
    let request = Request::builder()
        .method(Method::POST)
        .uri(&login_url)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&login_data)?))?;

    let https = HttpsConnector::new();
    let http_client = Client::builder().build::<_, Body>(https);
    let response = http_client.request(request).await?;
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await?;
    let body: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| anyhow!("login server returned a non-JSON body ({}): {}", status, e))?;

    if !status.is_success() {
        println!("❌ Login failed ({})", status);
        return Err(anyhow!(
            "login rejected: {}",
            body["error"].as_str().unwrap_or("unknown error")
        ));
    }

    println!("✅ Login succeeded!");
    println!();
    println!("   🎭 Role:          {}", body["auth"]["role"].as_str().unwrap_or_default());
    println!(
        "   🆔 Principal:     {}",
        body["auth"]["canonical_arn"].as_str().unwrap_or_default()
    );
    println!(
        "   🏢 Account:       {}",
        body["auth"]["account_id"].as_str().unwrap_or_default()
    );
    println!(
        "   📄 Request ID:    {}",
        body["request_id"].as_str().unwrap_or_default()
    );
    println!();

    Ok(())
}
