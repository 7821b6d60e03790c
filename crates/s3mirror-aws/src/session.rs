//! Shared AWS SDK configuration
//!
//! The session is built once at startup. Credentials come from the SDK's
//! default chain (environment, shared profile, web identity, ECS task role,
//! EC2 instance metadata) unless a static provider is supplied.

use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, ConfigLoader, Region, SdkConfig};
use aws_credential_types::provider::ProvideCredentials;
use aws_credential_types::Credentials;
use s3mirror_core::config::AwsConfig;
use tracing::{debug, info, instrument};

use crate::AwsError;

/// Resolved SDK configuration shared by the SQS and S3 adapters
#[derive(Debug, Clone)]
pub struct AwsSession {
    sdk_config: SdkConfig,
    endpoint_url: Option<String>,
}

impl AwsSession {
    /// Loads the session using the default credential chain
    #[instrument(skip_all, fields(region = %config.region))]
    pub async fn load(config: &AwsConfig) -> Self {
        let sdk_config = Self::loader(config).load().await;
        debug!(endpoint_url = ?config.endpoint_url, "AWS configuration loaded");
        Self::from_parts(sdk_config, config)
    }

    /// Loads the session with fixed credentials instead of the default chain
    pub async fn with_credentials(config: &AwsConfig, credentials: Credentials) -> Self {
        let sdk_config = Self::loader(config)
            .credentials_provider(credentials)
            .load()
            .await;
        Self::from_parts(sdk_config, config)
    }

    fn loader(config: &AwsConfig) -> ConfigLoader {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .retry_config(RetryConfig::standard().with_max_attempts(config.max_attempts.max(1)));
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        loader
    }

    fn from_parts(sdk_config: SdkConfig, config: &AwsConfig) -> Self {
        Self {
            sdk_config,
            endpoint_url: config.endpoint_url.clone(),
        }
    }

    pub fn sdk_config(&self) -> &SdkConfig {
        &self.sdk_config
    }

    pub fn endpoint_url(&self) -> Option<&str> {
        self.endpoint_url.as_deref()
    }

    /// Resolves credentials once so a broken chain fails at startup
    ///
    /// # Errors
    ///
    /// Returns [`AwsError::NoCredentialsProvider`] when the configuration
    /// has no provider, or [`AwsError::Credentials`] when the chain fails.
    #[instrument(skip(self))]
    pub async fn verify_credentials(&self) -> Result<(), AwsError> {
        let provider = self
            .sdk_config
            .credentials_provider()
            .ok_or(AwsError::NoCredentialsProvider)?;

        let credentials = provider
            .provide_credentials()
            .await
            .map_err(|e| AwsError::Credentials(aws_sdk_sqs::error::DisplayErrorContext(&e).to_string()))?;

        info!(
            access_key_id = %redact(credentials.access_key_id()),
            temporary = credentials.session_token().is_some(),
            "AWS credentials resolved"
        );
        Ok(())
    }
}

/// Keeps the last four characters of a key id for log correlation
fn redact(key_id: &str) -> String {
    let visible = key_id.len().saturating_sub(4);
    match key_id.get(visible..) {
        Some(tail) if visible > 0 => format!("****{tail}"),
        _ => "****".to_string(),
    }
}
