use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use log::{info, debug, error};
use super::metadata::{FieldUpdate, Item, MetadataStore, AttributeValue, KEY_ATTRIBUTE};
use super::pipeline::{FailureDetails, PipelineReporter};
use super::platform::{
    EndpointConfigRequest, EndpointRequest, JobPlatform, ModelRequest, TrainingJobDescription, TrainingJobRequest,
};
use super::storage::{ArtifactCredentials, ObjectStore, ObjectSummary, ObjectVersion, SessionProvider};

const ACCESS_KEY_HEADER: &str = "x-artifact-access-key-id";
const SECRET_KEY_HEADER: &str = "x-artifact-secret-access-key";
const SESSION_TOKEN_HEADER: &str = "x-artifact-session-token";

/// HTTP client for the platform gateway.
///
/// Every collaborator operation is a JSON `POST {base_url}/{service}/{Operation}`
/// whose body and response use the platform's own field names. A gateway
/// opened through [`SessionProvider`] forwards the delegated credentials on
/// each request so the far side can act with the caller's permissions.
#[derive(Clone)]
pub struct Gateway {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<ArtifactCredentials>,
}

impl Gateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("Using platform gateway at {}", base_url);
        Self { client: reqwest::Client::new(), base_url, credentials: None }
    }

    pub fn with_credentials(mut self, credentials: ArtifactCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    fn generate_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(credentials) = &self.credentials {
            let forwarded: [(&'static str, &str); 3] = [
                (ACCESS_KEY_HEADER, &credentials.access_key_id),
                (SECRET_KEY_HEADER, &credentials.secret_access_key),
                (SESSION_TOKEN_HEADER, &credentials.session_token),
            ];
            for (name, value) in forwarded {
                let mut value = HeaderValue::from_str(value)
                    .with_context(|| format!("Failed to create {} header", name))?;
                value.set_sensitive(true);
                headers.insert(HeaderName::from_static(name), value);
            }
        }
        Ok(headers)
    }

    async fn call<B, R>(&self, service: &str, operation: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}/{}", self.base_url, service, operation);
        debug!("POST {}", url);
        let response = self.client.post(&url)
            .headers(self.generate_headers()?)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", operation))?;

        if response.status().is_success() {
            let value = response.json::<Value>().await
                .with_context(|| format!("Failed to parse {} response as JSON", operation))?;
            debug!("{} response: {:?}", operation, value);
            serde_json::from_value(value)
                .with_context(|| format!("Unexpected {} response shape", operation))
        } else {
            let status = response.status();
            let error_text = response.text().await
                .with_context(|| format!("Failed to get error text from {} response", operation))?;
            error!("{} failed with {}: {}", operation, status, error_text);
            anyhow::bail!("{} failed with {}: {}", operation, status, error_text)
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListObjectsResponse {
    #[serde(default)]
    contents: Vec<ObjectSummary>,
    #[serde(default)]
    is_truncated: bool,
    next_marker: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListObjectVersionsResponse {
    #[serde(default)]
    versions: Vec<ObjectVersion>,
    #[serde(default)]
    is_truncated: bool,
    next_key_marker: Option<String>,
    next_version_id_marker: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetObjectResponse {
    body: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeTrainingJobResponse {
    training_job_status: String,
    creation_time: Option<f64>,
    training_end_time: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeEndpointResponse {
    endpoint_status: String,
}

/// Platform timestamps are fractional epoch seconds.
fn epoch_seconds(value: Option<f64>) -> Option<DateTime<Utc>> {
    let secs = value?;
    DateTime::from_timestamp(secs.trunc() as i64, (secs.fract() * 1e9) as u32)
}

fn arn_field(response: &Value, field: &str) -> Option<String> {
    response.get(field).and_then(Value::as_str).map(str::to_string)
}

#[async_trait]
impl ObjectStore for Gateway {
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectSummary>> {
        let mut objects = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let mut request = json!({"Bucket": bucket, "Prefix": prefix});
            if let Some(marker) = &marker {
                request["Marker"] = json!(marker);
            }
            let page: ListObjectsResponse = self.call("s3", "ListObjects", &request).await?;
            // NextMarker is optional without a delimiter; the last key continues the listing.
            let next = page.next_marker
                .or_else(|| page.contents.last().map(|o| o.key.clone()));
            objects.extend(page.contents);
            match next {
                Some(next) if page.is_truncated => marker = Some(next),
                _ => break,
            }
        }
        Ok(objects)
    }

    async fn list_object_versions(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectVersion>> {
        let mut versions = Vec::new();
        let mut markers: Option<(String, Option<String>)> = None;
        loop {
            let mut request = json!({"Bucket": bucket, "Prefix": prefix});
            if let Some((key_marker, version_marker)) = &markers {
                request["KeyMarker"] = json!(key_marker);
                if let Some(version_marker) = version_marker {
                    request["VersionIdMarker"] = json!(version_marker);
                }
            }
            let page: ListObjectVersionsResponse = self.call("s3", "ListObjectVersions", &request).await?;
            versions.extend(page.versions);
            match page.next_key_marker {
                Some(key_marker) if page.is_truncated => {
                    debug!("Version listing for {} continues at {}", prefix, key_marker);
                    markers = Some((key_marker, page.next_version_id_marker));
                }
                _ => break,
            }
        }
        Ok(versions)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let response: GetObjectResponse = self
            .call("s3", "GetObject", &json!({"Bucket": bucket, "Key": key}))
            .await?;
        BASE64.decode(response.body.as_bytes())
            .with_context(|| format!("Object body for {} is not base64", key))
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let _: Value = self
            .call("s3", "PutObject", &json!({"Bucket": bucket, "Key": key, "Body": BASE64.encode(body)}))
            .await?;
        Ok(())
    }
}

impl SessionProvider for Gateway {
    fn open_store(&self, credentials: &ArtifactCredentials) -> Result<Box<dyn ObjectStore>> {
        if credentials.access_key_id.is_empty() || credentials.session_token.is_empty() {
            anyhow::bail!("Delegated artifact credentials are incomplete");
        }
        Ok(Box::new(self.clone().with_credentials(credentials.clone())))
    }
}

#[async_trait]
impl JobPlatform for Gateway {
    async fn create_training_job(&self, request: &TrainingJobRequest) -> Result<Option<String>> {
        let response: Value = self.call("sagemaker", "CreateTrainingJob", request).await?;
        Ok(arn_field(&response, "TrainingJobArn"))
    }

    async fn describe_training_job(&self, name: &str) -> Result<TrainingJobDescription> {
        let response: DescribeTrainingJobResponse = self
            .call("sagemaker", "DescribeTrainingJob", &json!({"TrainingJobName": name}))
            .await?;
        Ok(TrainingJobDescription {
            status: response.training_job_status,
            creation_time: epoch_seconds(response.creation_time),
            end_time: epoch_seconds(response.training_end_time),
        })
    }

    async fn create_model(&self, request: &ModelRequest) -> Result<Option<String>> {
        let response: Value = self.call("sagemaker", "CreateModel", request).await?;
        Ok(arn_field(&response, "ModelArn"))
    }

    async fn create_endpoint_config(&self, request: &EndpointConfigRequest) -> Result<Option<String>> {
        let response: Value = self.call("sagemaker", "CreateEndpointConfig", request).await?;
        Ok(arn_field(&response, "EndpointConfigArn"))
    }

    async fn create_endpoint(&self, request: &EndpointRequest) -> Result<Option<String>> {
        let response: Value = self.call("sagemaker", "CreateEndpoint", request).await?;
        Ok(arn_field(&response, "EndpointArn"))
    }

    async fn describe_endpoint(&self, name: &str) -> Result<String> {
        let response: DescribeEndpointResponse = self
            .call("sagemaker", "DescribeEndpoint", &json!({"EndpointName": name}))
            .await?;
        Ok(response.endpoint_status)
    }
}

/// `SET #f0 = :v0, #f1 = if_not_exists(#f1, :v1)` plus its name and value maps.
fn update_expression(updates: &[FieldUpdate]) -> (String, Map<String, Value>, Map<String, Value>) {
    let mut clauses = Vec::with_capacity(updates.len());
    let mut names = Map::new();
    let mut values = Map::new();
    for (i, update) in updates.iter().enumerate() {
        let (name, value) = (format!("#f{}", i), format!(":v{}", i));
        if update.once {
            clauses.push(format!("{} = if_not_exists({}, {})", name, name, value));
        } else {
            clauses.push(format!("{} = {}", name, value));
        }
        names.insert(name, Value::String(update.name.clone()));
        values.insert(value, json!(update.value));
    }
    (format!("SET {}", clauses.join(", ")), names, values)
}

#[async_trait]
impl MetadataStore for Gateway {
    async fn put_item(&self, table: &str, key: &str, mut item: Item) -> Result<()> {
        item.insert(KEY_ATTRIBUTE.to_string(), AttributeValue::string(key));
        let _: Value = self
            .call("dynamodb", "PutItem", &json!({
                "TableName": table,
                "Item": item,
                "ConditionExpression": "attribute_not_exists(#k)",
                "ExpressionAttributeNames": {"#k": KEY_ATTRIBUTE},
            }))
            .await?;
        Ok(())
    }

    async fn update_item(&self, table: &str, key: &str, updates: Vec<FieldUpdate>) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let (expression, names, values) = update_expression(&updates);
        let _: Value = self
            .call("dynamodb", "UpdateItem", &json!({
                "TableName": table,
                "Key": {KEY_ATTRIBUTE: {"S": key}},
                "UpdateExpression": expression,
                "ExpressionAttributeNames": names,
                "ExpressionAttributeValues": values,
            }))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PipelineReporter for Gateway {
    async fn report_success(&self, job_id: &str, continuation_token: Option<String>, summary: Option<String>) -> Result<()> {
        let mut body = json!({"jobId": job_id});
        if let Some(token) = continuation_token {
            body["continuationToken"] = json!(token);
        }
        if let Some(summary) = summary {
            body["executionDetails"] = json!({"summary": summary});
        }
        let _: Value = self.call("codepipeline", "PutJobSuccessResult", &body).await?;
        info!("Reported success for pipeline job {}", job_id);
        Ok(())
    }

    async fn report_failure(&self, job_id: &str, details: FailureDetails) -> Result<()> {
        let _: Value = self
            .call("codepipeline", "PutJobFailureResult", &json!({"jobId": job_id, "failureDetails": details}))
            .await?;
        info!("Reported failure for pipeline job {}", job_id);
        Ok(())
    }
}
