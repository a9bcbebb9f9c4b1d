use anyhow::{anyhow, Result};
use aws_sdk_sts::Client as StsClient;
use tracing::{error, info};

pub struct AwsService {
    pub sts_client: StsClient,
}

impl AwsService {
    pub fn new(sts_client: StsClient) -> Self {
        Self { sts_client }
    }

    /// Confirm the local credentials resolve to an IAM principal before
    /// handing a signed request to the login server.
    pub async fn validate_caller_identity(&self) -> Result<String> {
        match self.sts_client.get_caller_identity().send().await {
            Ok(identity) => match identity.arn() {
                Some(arn) => {
                    info!(
                        account = identity.account().unwrap_or_default(),
                        "Validated IAM identity: {}", arn
                    );
                    Ok(arn.to_string())
                }
                None => Err(anyhow!("STS returned no caller identity ARN")),
            },
            Err(e) => {
                error!("Failed to validate IAM credentials: {}", e);
                Err(anyhow!("failed to validate IAM credentials: {}", e))
            }
        }
    }
}
