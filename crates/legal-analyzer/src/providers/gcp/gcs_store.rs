//! Google Cloud Storage blob store
//!
//! Raw uploads, status entries and processed artifacts all live as objects
//! in one bucket.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

use google_cloud_storage::client::google_cloud_auth::credentials::CredentialsFile;
use google_cloud_storage::client::{Client as GcsClient, ClientConfig};
use google_cloud_storage::http::objects::delete::DeleteObjectRequest;
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::list::ListObjectsRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use google_cloud_storage::http::Error as GcsError;

use crate::error::{Error, Result};
use crate::providers::blob_store::BlobStore;

/// Google Cloud Storage blob store
pub struct GcsBlobStore {
    client: GcsClient,
    bucket: String,
}

impl GcsBlobStore {
    /// Create a new GCS blob store
    ///
    /// With no key path, credentials come from the environment
    /// (`GOOGLE_APPLICATION_CREDENTIALS` or the metadata server).
    pub async fn new(bucket: String, key_path: Option<&Path>) -> Result<Self> {
        let config = match key_path {
            Some(path) => {
                let credentials = CredentialsFile::new_from_file(path.to_string_lossy().to_string())
                    .await
                    .map_err(|e| {
                        Error::Config(format!(
                            "Failed to read GCS credentials {}: {}",
                            path.display(),
                            e
                        ))
                    })?;
                ClientConfig::default().with_credentials(credentials).await
            }
            None => ClientConfig::default().with_auth().await,
        }
        .map_err(|e| Error::Config(format!("Failed to create GCS client: {}", e)))?;

        Ok(Self {
            client: GcsClient::new(config),
            bucket,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn get_request(&self, key: &str) -> GetObjectRequest {
        GetObjectRequest {
            bucket: self.bucket.clone(),
            object: key.to_string(),
            ..Default::default()
        }
    }
}

fn is_not_found(err: &GcsError) -> bool {
    matches!(err, GcsError::Response(response) if response.code == 404)
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    async fn put(&self, key: &str, data: Bytes, media_type: &str) -> Result<()> {
        let mut media = Media::new(key.to_string());
        media.content_type = media_type.to_string().into();
        let upload_type = UploadType::Simple(media);

        self.client
            .upload_object(
                &UploadObjectRequest {
                    bucket: self.bucket.clone(),
                    ..Default::default()
                },
                data.to_vec(),
                &upload_type,
            )
            .await
            .map_err(|e| Error::storage(format!("Failed to upload {} to GCS: {}", key, e)))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        match self
            .client
            .download_object(&self.get_request(key), &Range::default())
            .await
        {
            Ok(data) => Ok(data),
            Err(e) if is_not_found(&e) => Err(Error::not_found(key)),
            Err(e) => Err(Error::storage(format!(
                "Failed to download {} from GCS: {}",
                key, e
            ))),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut page_token = None;

        loop {
            let request = ListObjectsRequest {
                bucket: self.bucket.clone(),
                prefix: Some(prefix.to_string()),
                page_token: page_token.take(),
                ..Default::default()
            };

            let response = self
                .client
                .list_objects(&request)
                .await
                .map_err(|e| Error::storage(format!("Failed to list GCS objects: {}", e)))?;

            keys.extend(response.items.unwrap_or_default().into_iter().map(|o| o.name));

            match response.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self
            .client
            .delete_object(&DeleteObjectRequest {
                bucket: self.bucket.clone(),
                object: key.to_string(),
                ..Default::default()
            })
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(Error::storage(format!(
                "Failed to delete {} from GCS: {}",
                key, e
            ))),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self.client.get_object(&self.get_request(key)).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(Error::storage(format!(
                "Failed to stat {} in GCS: {}",
                key, e
            ))),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        let list_request = ListObjectsRequest {
            bucket: self.bucket.clone(),
            max_results: Some(1),
            ..Default::default()
        };

        self.client
            .list_objects(&list_request)
            .await
            .map(|_| true)
            .map_err(|e| Error::storage(format!("GCS health check failed: {}", e)))
    }

    fn name(&self) -> &str {
        "gcs"
    }
}
