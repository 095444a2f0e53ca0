//! S3 compatible object storage (AWS S3, Tencent COS, Aliyun OSS...)

use std::collections::HashMap;

use aws_sdk_s3::{
    config::{BehaviorVersion, Credentials, Region},
    error::DisplayErrorContext,
    types::MultipartUpload,
    Client,
};
use opendal::services::S3;
use upsync::{config::BucketConfig, provider_error, UploadTask};

use super::op::{Flavor, OpStorage};

/// User metadata key holding the content hash of an uploaded object
pub const HASH_KEY: &str = "hash";

pub fn storage(config: &BucketConfig) -> upsync::Result<OpStorage> {
    let base = config.base_path.trim_matches('/');

    let mut builder = S3::default()
        .bucket(&config.bucket)
        .region(&config.region)
        .access_key_id(&config.access_key_id)
        .secret_access_key(&config.secret_access_key)
        .root(&format!("/{base}"));
    if let Some(endpoint) = &config.endpoint {
        builder = builder.endpoint(endpoint);
    }
    if config.virtual_host_style {
        builder = builder.enable_virtual_host_style();
    }

    let name = if base.is_empty() {
        format!("s3://{}", config.bucket)
    } else {
        format!("s3://{}/{base}", config.bucket)
    };
    let uploads = MultipartUploads::new(config);
    Ok(OpStorage::new(builder, Flavor::Bucket, name)?.with_uploads(uploads))
}

/// Lister of the multipart uploads pending under the base path.
///
/// The operator aborts the uploads it fails itself, but a process killed
/// mid-upload leaves its parts on the bucket until they are listed and
/// aborted.
#[derive(Debug, Clone)]
pub struct MultipartUploads {
    client: Client,
    bucket: String,
    prefix: String,
}

impl MultipartUploads {
    pub fn new(config: &BucketConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "upsync-config",
        );
        let mut s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(!config.virtual_host_style);
        if let Some(endpoint) = &config.endpoint {
            s3_config = s3_config.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(s3_config.build()),
            bucket: config.bucket.clone(),
            prefix: key_prefix(&config.base_path),
        }
    }

    /// Keys of the pending uploads, relative to the base path
    pub async fn list(&self) -> upsync::Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut key_marker = None;
        let mut upload_id_marker = None;

        loop {
            let response = self
                .client
                .list_multipart_uploads()
                .bucket(&self.bucket)
                .prefix(&self.prefix)
                .set_key_marker(key_marker.take())
                .set_upload_id_marker(upload_id_marker.take())
                .send()
                .await
                .map_err(|err| {
                    provider_error!("list uploads", self.prefix, "{}", DisplayErrorContext(&err))
                })?;

            keys.extend(fragment_keys(&self.prefix, response.uploads()));

            if !response.is_truncated().unwrap_or(false) {
                break;
            }
            key_marker = response.next_key_marker().map(str::to_string);
            upload_id_marker = response.next_upload_id_marker().map(str::to_string);
            if key_marker.is_none() {
                break;
            }
        }
        Ok(keys)
    }
}

/// Object key prefix of the base path, empty or ending with `/`
fn key_prefix(base_path: &str) -> String {
    let base = base_path.trim_matches('/');
    if base.is_empty() {
        String::new()
    } else {
        format!("{base}/")
    }
}

/// Keys of a page of uploads, relative to `prefix`. A key may appear once
/// per upload id.
fn fragment_keys(prefix: &str, uploads: &[MultipartUpload]) -> Vec<String> {
    uploads
        .iter()
        .filter_map(|upload| upload.key())
        .filter_map(|key| key.strip_prefix(prefix))
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

/// Object properties derived from the headers of an upload
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ObjectProps {
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
    pub user_metadata: HashMap<String, String>,
}

impl ObjectProps {
    pub fn from_task(task: &UploadTask) -> Self {
        let mut props = ObjectProps::default();
        for (key, value) in &task.headers {
            match key.to_ascii_lowercase().as_str() {
                "content-type" => props.content_type = Some(value.clone()),
                "cache-control" => props.cache_control = Some(value.clone()),
                "content-disposition" => props.content_disposition = Some(value.clone()),
                lower => {
                    props
                        .user_metadata
                        .insert(metadata_key(lower).to_string(), value.clone());
                }
            }
        }
        props
            .user_metadata
            .insert(HASH_KEY.to_string(), task.hash.clone());
        props
    }
}

/// Strip vendor prefixes such as `x-amz-meta-` or `x-oss-meta-`
fn metadata_key(key: &str) -> &str {
    if let Some(rest) = key.strip_prefix("x-") {
        if let Some((_, name)) = rest.split_once("-meta-") {
            return name;
        }
    }
    key
}
