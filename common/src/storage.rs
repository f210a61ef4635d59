// Copyright (c) The Up Authors. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use tracing::{debug, info};

use crate::config::StorageConfig;

/// Errors surface as the SDK's native types.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Client for the S3-compatible object store holding build contexts.
#[derive(Clone)]
pub struct Storage {
    client: aws_sdk_s3::Client,
    endpoint: String,
}

impl Storage {
    /// Build a client against the configured endpoint with static
    /// credentials and path-style addressing.
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let endpoint = config.host().to_string();

        let credentials = aws_sdk_s3::config::Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "static",
        );

        let region = if config.location.is_empty() {
            "us-east-1".to_string()
        } else {
            config.location.clone()
        };

        let defaults = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(credentials)
            .endpoint_url(format!("{}://{}", config.scheme(), endpoint))
            .load()
            .await;

        let config = aws_sdk_s3::config::Builder::from(&defaults).force_path_style(true).build();

        Ok(Self { client: aws_sdk_s3::Client::from_conf(config), endpoint })
    }

    /// Endpoint host, without a scheme.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(err)) if err.err().is_not_found() => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn create_bucket(&self, bucket: &str, location: &str) -> Result<()> {
        let mut request = self.client.create_bucket().bucket(bucket);

        if !location.is_empty() {
            let constraint = BucketLocationConstraint::from(location);
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder().location_constraint(constraint).build(),
            );
        }

        request.send().await?;
        info!("Created bucket: {}", bucket);
        Ok(())
    }

    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        debug!("Uploading {} bytes to {}/{}", body.len(), bucket, key);

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_strips_the_endpoint_scheme() {
        let storage = Storage::connect(&StorageConfig {
            endpoint: "http://s3.example:9000".into(),
            access_key: "key".into(),
            secret_key: "secret".into(),
            ..Default::default()
        })
        .await
        .unwrap();

        assert_eq!(storage.endpoint(), "s3.example:9000");
    }
}
