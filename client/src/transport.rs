use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use log::debug;
use reqwest::blocking::multipart;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use url::Url;

use crate::errors::{Error, Result};

/// Boundary to the remote service: execute one call, get JSON back or a
/// classified error. Implementations never retry; retry policy belongs to
/// the polling loop, not to the transport.
pub trait Transport: Send + Sync {
    fn execute(&self, request: ApiRequest) -> Result<serde_json::Value>;
}

/// One remote call: method, path relative to the service endpoint, query
/// parameters, an optional JSON body and an optional upload stream.
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(&'static str, String)>,
    pub body: Option<serde_json::Value>,
    pub upload: Option<UploadPayload>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        ApiRequest {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            upload: None,
        }
    }

    pub fn query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn upload(mut self, upload: UploadPayload) -> Self {
        self.upload = Some(upload);
        self
    }
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("body", &self.body)
            .field("upload", &self.upload.is_some())
            .finish()
    }
}

/// A local payload exposed to the transport as one opaque octet stream; the
/// service accepts exactly one upload content type, whatever the source.
///
/// Holds the underlying handle for the duration of a single call and drops
/// it when the request is consumed, on success and failure alike.
pub struct UploadPayload {
    reader: Box<dyn Read + Send>,
    length: u64,
}

impl UploadPayload {
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::open(&path)?;
        let length = file.metadata()?.len();
        Ok(UploadPayload {
            reader: Box::new(file),
            length,
        })
    }

    pub fn from_reader(reader: impl Read + Send + 'static, length: u64) -> Self {
        UploadPayload {
            reader: Box::new(reader),
            length,
        }
    }

    pub fn length(&self) -> u64 {
        self.length
    }
}

impl fmt::Debug for UploadPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadPayload")
            .field("length", &self.length)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub endpoint: Url,
    pub token: Option<String>,
    pub accept_invalid_certificates: bool,
    pub proxy: Option<Url>,
    pub timeout: Duration,
}

/// Production transport over blocking HTTP.
pub struct HttpTransport {
    http_client: reqwest::blocking::Client,
    endpoint: Url,
    token: Option<String>,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certificates)
            .timeout(config.timeout);
        if let Some(proxy) = config.proxy {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy)
                    .map_err(|error| Error::Communication(format!("invalid proxy: {error}")))?,
            );
        }
        let http_client = builder.build().map_err(|error| {
            Error::Communication(format!("failed to initialise the HTTP client: {error}"))
        })?;
        Ok(HttpTransport {
            http_client,
            endpoint: config.endpoint,
            token: config.token,
        })
    }

    fn request_url(&self, request: &ApiRequest) -> Result<Url> {
        let mut url = self.endpoint.join(&request.path).map_err(|error| {
            Error::Communication(format!("invalid request url `{}`: {error}", request.path))
        })?;
        if !request.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(request.query.iter().map(|(key, value)| (*key, value.as_str())));
        }
        Ok(url)
    }

    fn handle_response(response: reqwest::blocking::Response) -> Result<serde_json::Value> {
        let status = response.status();
        if status.is_success() {
            let text = response
                .text()
                .map_err(|error| Error::Communication(error.to_string()))?;
            if text.is_empty() {
                // Deletes come back with an empty body.
                return Ok(serde_json::Value::Null);
            }
            return serde_json::from_str(&text).map_err(|error| {
                Error::Interface(format!("could not parse server response: {error}"))
            });
        }

        // A JSON error body is a service-reported rejection and classifies
        // by reason; anything else is a transport-level failure.
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map_or(false, |value| value.starts_with("application/json"));
        if is_json {
            if let Ok(body) = response.json::<serde_json::Value>() {
                return Err(Error::from_error_response(&body));
            }
        }
        Err(Error::Communication(format!(
            "error communicating with the server, server returned {status}"
        )))
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: ApiRequest) -> Result<serde_json::Value> {
        let url = self.request_url(&request)?;
        debug!("{} {}", request.method, url);

        let mut builder = self.http_client.request(request.method.clone(), url);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        builder = match (request.body, request.upload) {
            (Some(body), Some(upload)) => {
                let metadata = multipart::Part::text(body.to_string())
                    .mime_str("application/json")
                    .map_err(|error| Error::Communication(error.to_string()))?;
                let media =
                    multipart::Part::reader_with_length(upload.reader, upload.length)
                        .mime_str("application/octet-stream")
                        .map_err(|error| Error::Communication(error.to_string()))?;
                let form = multipart::Form::new()
                    .part("metadata", metadata)
                    .part("media", media);
                builder.multipart(form)
            }
            (Some(body), None) => builder.json(&body),
            (None, Some(upload)) => builder
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(reqwest::blocking::Body::sized(upload.reader, upload.length)),
            (None, None) => builder,
        };

        let response = builder
            .send()
            .map_err(|error| Error::Communication(error.to_string()))?;
        Self::handle_response(response)
    }
}
