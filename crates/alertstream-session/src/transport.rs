use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Response, StatusCode};
use tracing::debug;

use crate::config::{DeviceConfig, ALERT_STREAM_PATH};
use crate::error::{Result, SessionError};

/// Body of an open alert stream, one network chunk per item.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Something that can open the device's alert stream.
pub trait AlertTransport: Send + Sync {
    /// Open the stream. A non-success status is an error.
    fn open(&self) -> impl Future<Output = Result<ChunkStream>> + Send;
}

impl<T: AlertTransport> AlertTransport for Arc<T> {
    fn open(&self) -> impl Future<Output = Result<ChunkStream>> + Send {
        (**self).open()
    }
}

/// HTTP transport with digest authentication.
///
/// The first request goes out without credentials; a `401` carrying a
/// `Digest` challenge is answered once.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    device: DeviceConfig,
    url: String,
}

impl HttpTransport {
    /// Build a transport. `connect_timeout` bounds TCP connection setup only;
    /// the body is read for as long as the device keeps it open.
    pub fn new(device: DeviceConfig, connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|err| SessionError::Config(format!("http client: {err}")))?;
        let url = device.alert_stream_url();
        Ok(Self {
            client,
            device,
            url,
        })
    }

    /// The alert stream URL this transport connects to.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn get(&self, authorization: Option<&str>) -> Result<Response> {
        let mut request = self.client.get(&self.url);
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }
        request.send().await.map_err(|err| SessionError::Connect {
            url: self.url.clone(),
            source: Box::new(err),
        })
    }

    fn digest_authorization(&self, response: &Response) -> Result<String> {
        let challenge = response
            .headers()
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find(|value| value.trim_start().to_ascii_lowercase().starts_with("digest"))
            .ok_or(SessionError::AuthFailure)?;

        let mut prompt = digest_auth::parse(challenge)
            .map_err(|err| SessionError::DigestChallenge(err.to_string()))?;
        let context = digest_auth::AuthContext::new(
            self.device.username.as_str(),
            self.device.password.as_str(),
            ALERT_STREAM_PATH,
        );
        let answer = prompt
            .respond(&context)
            .map_err(|err| SessionError::DigestChallenge(err.to_string()))?;
        Ok(answer.to_header_string())
    }
}

impl AlertTransport for HttpTransport {
    async fn open(&self) -> Result<ChunkStream> {
        let mut response = self.get(None).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!(url = %self.url, "answering digest challenge");
            let authorization = self.digest_authorization(&response)?;
            response = self.get(Some(&authorization)).await?;
        }

        check_status(response.status())?;

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|err| SessionError::Read(Box::new(err))));
        Ok(Box::pin(body))
    }
}

/// Map a response status to the session error taxonomy.
pub fn check_status(status: StatusCode) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::UNAUTHORIZED => Err(SessionError::AuthFailure),
        StatusCode::NOT_FOUND => Err(SessionError::EndpointNotFound),
        other => Err(SessionError::UnexpectedStatus(other.as_u16())),
    }
}
