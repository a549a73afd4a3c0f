//! Object store over the hosted storage service.
use async_trait::async_trait;
use reqwest::{header, Method};
use tracing::debug;

use super::HostedClient;
use crate::error::AppError;
use crate::storage::ObjectStore;

pub struct HostedObjects {
    client: HostedClient,
}

impl HostedObjects {
    pub fn new(client: HostedClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for HostedObjects {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AppError> {
        let size = bytes.len();
        let request = self
            .client
            .request(Method::POST, &format!("/storage/v1/object/{bucket}/{path}"))
            .header(header::CONTENT_TYPE, content_type)
            .header("cache-control", "max-age=3600")
            .header("x-upsert", "false")
            .body(bytes);
        self.client.send(request).await?;
        debug!(bucket, path, size, "object uploaded");
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{bucket}/{path}", self.client.base_url())
    }
}
