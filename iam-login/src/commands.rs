use clap::Parser;
use std::path::PathBuf;

use crate::common::config::DEFAULT_STS_ENDPOINT;

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "IAM_LOGIN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port to listen on for login requests (overrides the config file)
    #[arg(short, long, env = "IAM_LOGIN_PORT")]
    pub port: Option<u16>,

    /// Value callers must sign in the X-IAM-Server-ID header (overrides the config file)
    #[arg(long, env = "IAM_LOGIN_HEADER_VALUE")]
    pub header_value: Option<String>,

    /// STS endpoint signed requests are replayed against (overrides the config file)
    #[arg(long, env = "IAM_LOGIN_STS_ENDPOINT")]
    pub sts_endpoint: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct LoginCommand {
    /// Login server base URL
    #[arg(
        short,
        long,
        env = "IAM_LOGIN_SERVER",
        default_value = "http://localhost:8200"
    )]
    pub server_url: String,

    /// Role to log in with (defaults to the name of the IAM principal)
    #[arg(short, long, env = "IAM_LOGIN_ROLE")]
    pub role: Option<String>,

    /// Value to sign in the X-IAM-Server-ID header
    #[arg(long, env = "IAM_LOGIN_HEADER_VALUE")]
    pub header_value: Option<String>,

    /// STS endpoint the signed request targets
    #[arg(long, env = "IAM_LOGIN_STS_ENDPOINT", default_value = DEFAULT_STS_ENDPOINT)]
    pub sts_endpoint: String,

    /// Region used in the signature scope
    #[arg(long, env = "IAM_LOGIN_STS_REGION", default_value = "us-east-1")]
    pub sts_region: String,

    /// Skip checking the local credentials with STS before logging in
    #[arg(long)]
    pub skip_preflight: bool,
}
