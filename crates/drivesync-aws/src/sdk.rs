//! AWS SDK configuration shared by the SQS and S3 adapters

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_s3::config::Credentials;

/// Static credentials for local emulators or non-IAM deployments
#[derive(Clone)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

impl StaticCredentials {
    /// Returns credentials only when both halves are present
    pub fn from_parts(access_key_id: Option<&str>, secret_access_key: Option<&str>) -> Option<Self> {
        match (access_key_id, secret_access_key) {
            (Some(id), Some(secret)) => Some(Self {
                access_key_id: id.to_string(),
                secret_access_key: secret.to_string(),
            }),
            _ => None,
        }
    }
}

/// Loads an SDK configuration
///
/// Without static credentials the default provider chain (environment,
/// profile, IMDS, ...) is used.
///
/// # Arguments
/// * `region` - AWS region name
/// * `endpoint` - Optional custom endpoint URL (LocalStack, MinIO, ...)
/// * `credentials` - Optional static credentials
pub async fn load_sdk_config(
    region: &str,
    endpoint: Option<&str>,
    credentials: Option<&StaticCredentials>,
) -> SdkConfig {
    let mut builder =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));

    if let Some(endpoint) = endpoint {
        builder = builder.endpoint_url(endpoint);
    }

    if let Some(creds) = credentials {
        builder = builder.credentials_provider(Credentials::new(
            &creds.access_key_id,
            &creds.secret_access_key,
            None,
            None,
            "drivesync-static",
        ));
    }

    let config = builder.load().await;

    tracing::debug!(
        region,
        endpoint = endpoint.unwrap_or("default"),
        explicit_creds = credentials.is_some(),
        "AWS SDK configuration loaded"
    );

    config
}
