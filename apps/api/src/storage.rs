use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use tracing::info;

use crate::config::Config;
use crate::errors::AppError;

/// Archive of uploaded script files in S3 / MinIO.
/// Only the original upload is stored here; the extracted text lives on the project row.
#[derive(Clone)]
pub struct ScriptArchive {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl ScriptArchive {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Uploads a script file and returns its object key.
    pub async fn put_script(
        &self,
        project_id: uuid::Uuid,
        file_name: &str,
        content_type: &str,
        body: bytes::Bytes,
    ) -> Result<String, AppError> {
        let key = script_key(project_id, file_name);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 upload failed: {e}")))?;

        info!("Archived script to s3://{}/{}", self.bucket, key);
        Ok(key)
    }
}

pub fn script_key(project_id: uuid::Uuid, file_name: &str) -> String {
    format!("scripts/{}/{}", project_id, sanitize_file_name(file_name))
}

/// Keeps ASCII alphanumerics, '.', '-' and '_'; everything else becomes '_'.
/// Leading dots are stripped so keys never start a hidden or relative segment.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "script".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
pub async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "slate-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
