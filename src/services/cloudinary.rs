//! Cloudinary implementation of [`MediaHost`].
//!
//! Admin API reads (search, single resource) use HTTP basic auth. Upload API
//! writes (upload, destroy, explicit) are signed with the account secret.

use crate::services::media_host::{
    HostError, HostResult, MediaHost, Resource, SearchQuery, UploadRequest,
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response, multipart};
use serde::Deserialize;
use serde_json::{Value, json};
use sha1::{Digest, Sha1};
use tracing::debug;

/// Default Cloudinary API root; the cloud name is appended to it.
pub const DEFAULT_API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Account credentials needed to talk to Cloudinary.
#[derive(Clone)]
pub struct CloudinaryCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for CloudinaryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryCredentials")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct CloudinaryHost {
    client: Client,
    credentials: CloudinaryCredentials,
    base_url: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    resources: Vec<Resource>,
}

impl CloudinaryHost {
    pub fn new(credentials: CloudinaryCredentials, api_base: &str) -> Self {
        let base_url = format!(
            "{}/{}",
            api_base.trim_end_matches('/'),
            credentials.cloud_name
        );
        Self {
            client: Client::new(),
            credentials,
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Signed parameter list for an Upload API call, `api_key` and
    /// `signature` included.
    fn signed_params(
        &self,
        mut params: Vec<(&'static str, String)>,
    ) -> Vec<(&'static str, String)> {
        params.push(("timestamp", Utc::now().timestamp().to_string()));
        let signature = sign(&params, &self.credentials.api_secret);
        params.push(("api_key", self.credentials.api_key.clone()));
        params.push(("signature", signature));
        params
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(response: Response) -> HostResult<T> {
        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| HostError::Decode(err.to_string()))
    }
}

#[async_trait]
impl MediaHost for CloudinaryHost {
    async fn search(&self, query: &SearchQuery) -> HostResult<Vec<Resource>> {
        let body = json!({
            "expression": query.expression(),
            "sort_by": [{ "created_at": "desc" }],
            "max_results": query.max_results,
            "with_field": ["context"],
        });
        debug!("searching media host: {}", body);

        let response = self
            .client
            .post(self.url("resources/search"))
            .basic_auth(&self.credentials.api_key, Some(&self.credentials.api_secret))
            .json(&body)
            .send()
            .await?;

        let result: SearchResponse = Self::read_json(response).await?;
        Ok(result.resources)
    }

    async fn upload(&self, request: UploadRequest) -> HostResult<Resource> {
        let params = self.signed_params(vec![
            ("context", request.context),
            ("folder", request.folder),
        ]);

        let mut file = multipart::Part::bytes(request.bytes.to_vec())
            .file_name(request.filename.unwrap_or_else(|| "photo".into()));
        if let Some(content_type) = request.content_type.as_deref() {
            file = file.mime_str(content_type)?;
        }

        let mut form = multipart::Form::new().part("file", file);
        for (key, value) in params {
            form = form.text(key, value);
        }

        let response = self
            .client
            .post(self.url("image/upload"))
            .multipart(form)
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn resource(&self, public_id: &str) -> HostResult<Resource> {
        let response = self
            .client
            .get(self.url(&format!("resources/image/upload/{public_id}")))
            .basic_auth(&self.credentials.api_key, Some(&self.credentials.api_secret))
            .query(&[("context", "true")])
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn destroy(&self, public_id: &str) -> HostResult<()> {
        let params = self.signed_params(vec![("public_id", public_id.to_string())]);

        let response = self
            .client
            .post(self.url("image/destroy"))
            .form(&params)
            .send()
            .await?;

        let result: Value = Self::read_json(response).await?;
        debug!("destroy {} -> {}", public_id, result);
        Ok(())
    }

    async fn update_context(&self, public_id: &str, context: &str) -> HostResult<()> {
        let params = self.signed_params(vec![
            ("context", context.to_string()),
            ("public_id", public_id.to_string()),
            ("type", "upload".to_string()),
        ]);

        let response = self
            .client
            .post(self.url("image/explicit"))
            .form(&params)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}

/// Turn a non-success response into `HostError::Api`, pulling the message out
/// of `{"error": {"message": ..}}` when the body has that shape.
async fn check_status(response: Response) -> HostResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| error_message(&body));

    Err(HostError::Api {
        status: status.as_u16(),
        message,
    })
}

fn error_message(body: &Value) -> Option<String> {
    body.get("error")
        .and_then(|error| error.get("message"))
        .or_else(|| body.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Cloudinary request signature: parameters sorted by name, joined as
/// `k=v&k=v`, secret appended, SHA-1 hex digest.
pub fn sign(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params
        .iter()
        .filter(|(key, value)| {
            !value.is_empty()
                && !matches!(*key, "file" | "api_key" | "resource_type" | "cloud_name")
        })
        .collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::{Form, Multipart, Path, State},
        http::{HeaderMap, Method, StatusCode, Uri, header::AUTHORIZATION},
        response::{IntoResponse, Response as HttpResponse},
        routing::{get, post},
    };
    use bytes::Bytes;
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };
    use tokio::net::TcpListener;

    /// `key:secret`, base64-encoded.
    const BASIC_AUTH: &str = "Basic a2V5OnNlY3JldA==";

    /// One request as seen by the local stand-in API.
    #[derive(Debug, Clone)]
    struct Received {
        method: Method,
        path: String,
        query: Option<String>,
        authorization: Option<String>,
        body: Value,
        fields: HashMap<String, String>,
    }

    type Log = Arc<Mutex<Vec<Received>>>;

    fn record(
        log: &Log,
        method: Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: Value,
        fields: HashMap<String, String>,
    ) {
        log.lock().unwrap().push(Received {
            method,
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            authorization: headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
            body,
            fields,
        });
    }

    fn resource_json(public_id: &str) -> Value {
        json!({
            "public_id": public_id,
            "original_filename": "tet",
            "secure_url": format!("https://res.test/{public_id}.jpg"),
            "bytes": 4,
            "created_at": "2025-01-29T00:00:00Z",
            "context": { "custom": { "caption": "hi" } }
        })
    }

    async fn search_route(
        State(log): State<Log>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> HttpResponse {
        let authorized = headers
            .get(AUTHORIZATION)
            .is_some_and(|value| value == BASIC_AUTH);
        record(&log, method, &uri, &headers, body, HashMap::new());
        if !authorized {
            let body = json!({ "error": { "message": "Invalid credentials" } });
            return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
        }
        Json(json!({ "resources": [resource_json("root/u1/img0001")], "total_count": 1 }))
            .into_response()
    }

    async fn resource_route(
        State(log): State<Log>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        Path(public_id): Path<String>,
    ) -> HttpResponse {
        record(&log, method, &uri, &headers, Value::Null, HashMap::new());
        if public_id == "missing" {
            let body = json!({ "error": { "message": "Resource not found - missing" } });
            return (StatusCode::NOT_FOUND, Json(body)).into_response();
        }
        Json(resource_json(&public_id)).into_response()
    }

    async fn upload_route(
        State(log): State<Log>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        mut multipart: Multipart,
    ) -> Json<Value> {
        let mut fields = HashMap::new();
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let len = field.bytes().await.unwrap().len();
                fields.insert("file".to_string(), file_name);
                fields.insert("file.content_type".to_string(), content_type);
                fields.insert("file.len".to_string(), len.to_string());
            } else {
                fields.insert(name, field.text().await.unwrap());
            }
        }
        let public_id = format!("{}/img0001", fields["folder"]);
        record(&log, method, &uri, &headers, Value::Null, fields);
        Json(resource_json(&public_id))
    }

    async fn form_route(
        State(log): State<Log>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        Form(fields): Form<HashMap<String, String>>,
    ) -> HttpResponse {
        let broken = fields.get("public_id").is_some_and(|id| id == "broken");
        record(&log, method, &uri, &headers, Value::Null, fields);
        if broken {
            return (StatusCode::INTERNAL_SERVER_ERROR, "oops").into_response();
        }
        Json(json!({ "result": "ok" })).into_response()
    }

    async fn spawn_api() -> (String, Log) {
        let log = Log::default();
        let app = Router::new()
            .route("/v1_1/demo/resources/search", post(search_route))
            .route(
                "/v1_1/demo/resources/image/upload/{*public_id}",
                get(resource_route),
            )
            .route("/v1_1/demo/image/upload", post(upload_route))
            .route("/v1_1/demo/image/destroy", post(form_route))
            .route("/v1_1/demo/image/explicit", post(form_route))
            .with_state(log.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/v1_1"), log)
    }

    fn host(base: &str, api_secret: &str) -> CloudinaryHost {
        let credentials = CloudinaryCredentials {
            cloud_name: "demo".into(),
            api_key: "key".into(),
            api_secret: api_secret.into(),
        };
        CloudinaryHost::new(credentials, base)
    }

    /// Signature the host should have sent for the given received fields.
    fn expected_signature(seen: &Received, signed: &[&str]) -> String {
        let params: Vec<(&str, String)> = signed
            .iter()
            .map(|key| (*key, seen.fields[*key].clone()))
            .collect();
        sign(&params, "secret")
    }

    #[tokio::test]
    async fn search_posts_folder_query_with_basic_auth() {
        let (base, log) = spawn_api().await;
        let query = SearchQuery {
            folder: "root".into(),
            max_results: 200,
        };

        let found = host(&base, "secret").search(&query).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].public_id, "root/u1/img0001");
        assert_eq!(found[0].original_filename.as_deref(), Some("tet"));

        let seen = log.lock().unwrap()[0].clone();
        assert_eq!(seen.method, Method::POST);
        assert_eq!(seen.path, "/v1_1/demo/resources/search");
        assert_eq!(seen.authorization.as_deref(), Some(BASIC_AUTH));
        assert_eq!(seen.body["expression"], "public_id:root/*");
        assert_eq!(seen.body["max_results"], 200);
        assert_eq!(seen.body["sort_by"], json!([{ "created_at": "desc" }]));
        assert_eq!(seen.body["with_field"], json!(["context"]));
    }

    #[tokio::test]
    async fn resource_fetch_asks_for_context() {
        let (base, log) = spawn_api().await;

        let resource = host(&base, "secret")
            .resource("root/u1/img0001")
            .await
            .unwrap();

        assert_eq!(resource.public_id, "root/u1/img0001");
        assert_eq!(resource.context, Some(json!({ "custom": { "caption": "hi" } })));

        let seen = log.lock().unwrap()[0].clone();
        assert_eq!(seen.method, Method::GET);
        assert_eq!(seen.path, "/v1_1/demo/resources/image/upload/root/u1/img0001");
        assert_eq!(seen.query.as_deref(), Some("context=true"));
        assert_eq!(seen.authorization.as_deref(), Some(BASIC_AUTH));
    }

    #[tokio::test]
    async fn upload_sends_signed_multipart_form() {
        let (base, log) = spawn_api().await;
        let request = UploadRequest {
            bytes: Bytes::from_static(b"\xff\xd8\xff\xe0"),
            filename: Some("tet.jpg".into()),
            content_type: Some("image/jpeg".into()),
            folder: "root/u1".into(),
            context: "caption=hi|uploaderId=u1".into(),
        };

        let resource = host(&base, "secret").upload(request).await.unwrap();
        assert_eq!(resource.public_id, "root/u1/img0001");
        assert_eq!(resource.bytes, 4);

        let seen = log.lock().unwrap()[0].clone();
        assert_eq!(seen.method, Method::POST);
        assert_eq!(seen.path, "/v1_1/demo/image/upload");
        assert_eq!(seen.authorization, None);
        assert_eq!(seen.fields["file"], "tet.jpg");
        assert_eq!(seen.fields["file.content_type"], "image/jpeg");
        assert_eq!(seen.fields["file.len"], "4");
        assert_eq!(seen.fields["folder"], "root/u1");
        assert_eq!(seen.fields["context"], "caption=hi|uploaderId=u1");
        assert_eq!(seen.fields["api_key"], "key");
        assert!(seen.fields["timestamp"].parse::<i64>().is_ok());
        assert_eq!(
            seen.fields["signature"],
            expected_signature(&seen, &["context", "folder", "timestamp"])
        );
    }

    #[tokio::test]
    async fn destroy_and_explicit_are_signed_forms() {
        let (base, log) = spawn_api().await;
        let host = host(&base, "secret");

        host.destroy("root/u1/img0001").await.unwrap();
        host.update_context("root/u1/img0001", "caption=new%20one|uploaderId=u1")
            .await
            .unwrap();

        let seen = log.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);

        let destroy = &seen[0];
        assert_eq!(destroy.method, Method::POST);
        assert_eq!(destroy.path, "/v1_1/demo/image/destroy");
        assert_eq!(destroy.fields["public_id"], "root/u1/img0001");
        assert_eq!(destroy.fields["api_key"], "key");
        assert_eq!(
            destroy.fields["signature"],
            expected_signature(destroy, &["public_id", "timestamp"])
        );

        let explicit = &seen[1];
        assert_eq!(explicit.path, "/v1_1/demo/image/explicit");
        assert_eq!(explicit.fields["type"], "upload");
        assert_eq!(explicit.fields["context"], "caption=new%20one|uploaderId=u1");
        assert_eq!(
            explicit.fields["signature"],
            expected_signature(explicit, &["context", "public_id", "timestamp", "type"])
        );
    }

    #[tokio::test]
    async fn error_responses_become_api_errors() {
        let (base, _log) = spawn_api().await;

        let err = host(&base, "secret").resource("missing").await.unwrap_err();
        assert!(matches!(err, HostError::Api { status: 404, .. }));
        assert_eq!(err.message().as_deref(), Some("Resource not found - missing"));

        let query = SearchQuery {
            folder: "root".into(),
            max_results: 10,
        };
        let err = host(&base, "wrong").search(&query).await.unwrap_err();
        assert!(matches!(err, HostError::Api { status: 401, .. }));
        assert_eq!(err.message().as_deref(), Some("Invalid credentials"));

        let err = host(&base, "secret")
            .update_context("broken", "caption=x")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HostError::Api {
                status: 500,
                message: None
            }
        ));
    }

    #[test]
    fn signature_matches_reference_vector() {
        let params = [
            ("timestamp", "1315060510".to_string()),
            ("public_id", "sample_image".to_string()),
            ("eager", "w_400,h_300,c_pad|w_260,h_200,c_crop".to_string()),
        ];
        assert_eq!(
            sign(&params, "abcd"),
            "bfd09f95f331f558cbd1320e67aa8d488770583e"
        );
    }

    #[test]
    fn signature_skips_unsigned_parameters() {
        let signed = [
            ("folder", "tet-photo-journal/u1".to_string()),
            ("context", "caption=hi|uploaderId=u1".to_string()),
            ("timestamp", "1700000000".to_string()),
        ];
        let mut with_extras = signed.to_vec();
        with_extras.push(("api_key", "123".to_string()));
        with_extras.push(("resource_type", "image".to_string()));

        let expected = "c7628acf8e1d3d16aac7bd55262807d64e7ef874";
        assert_eq!(sign(&signed, "secret"), expected);
        assert_eq!(sign(&with_extras, "secret"), expected);
    }

    #[test]
    fn error_message_reads_nested_shape() {
        let body = json!({ "error": { "message": "Resource not found - x" } });
        assert_eq!(error_message(&body).as_deref(), Some("Resource not found - x"));
        assert_eq!(error_message(&json!({ "ok": true })), None);
    }

    #[test]
    fn debug_output_redacts_secret() {
        let creds = CloudinaryCredentials {
            cloud_name: "demo".into(),
            api_key: "key".into(),
            api_secret: "s3cr3t".into(),
        };
        assert!(!format!("{:?}", creds).contains("s3cr3t"));
        let host = CloudinaryHost::new(creds, "https://api.example.com/v1_1/");
        assert_eq!(host.url("image/upload"), "https://api.example.com/v1_1/demo/image/upload");
    }
}
