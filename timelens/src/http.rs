use crate::config::Source;
use crate::error::TimelensError;
use crate::mosaic::SheetLoader;
use crate::storyboard::InfoSource;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::{header, Method, Request, Uri};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use image::RgbaImage;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Fetches info payloads and storyboard sheets over HTTP(S)
#[derive(Clone)]
pub struct HttpSource {
    client: Client<HttpsConnector<HttpConnector>, Empty<Bytes>>,
    info_url: String,
    user_agent: String,
    timeout: Option<Duration>,
}

impl HttpSource {
    pub fn new(settings: &Source) -> Self {
        let connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();

        Self {
            client: Client::builder(TokioExecutor::new()).build(connector),
            info_url: settings.info_url.clone(),
            user_agent: settings.user_agent.clone(),
            timeout: settings.timeout,
        }
    }

    /// GET `url` and return the whole body.
    pub async fn get(&self, url: &str) -> Result<Bytes, TimelensError> {
        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.fetch(url))
                .await
                .map_err(|_| {
                    TimelensError::NetworkError(format!("{}: timed out after {:?}", url, timeout))
                })?,
            None => self.fetch(url).await,
        }
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, TimelensError> {
        let uri = Uri::try_from(url)
            .map_err(|e| TimelensError::ParseError(format!("invalid url {}: {}", url, e)))?;

        let req = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::USER_AGENT, self.user_agent.as_str())
            .body(Empty::<Bytes>::new())
            .map_err(|e| TimelensError::NetworkError(format!("build request: {}", e)))?;

        let res = self
            .client
            .request(req)
            .await
            .map_err(|e| TimelensError::NetworkError(format!("{}: {}", url, e)))?;

        let status = res.status();
        if !status.is_success() {
            return Err(TimelensError::NetworkError(format!(
                "{}: status {}",
                url, status
            )));
        }

        let body = res
            .into_body()
            .collect()
            .await
            .map_err(|e| TimelensError::NetworkError(format!("{}: read body: {}", url, e)))?
            .to_bytes();

        debug!("GET {}: {} bytes", url, body.len());
        Ok(body)
    }
}

#[async_trait]
impl InfoSource for HttpSource {
    async fn video_info(&self, video_id: &str) -> Result<String, TimelensError> {
        let url = info_request_url(&self.info_url, video_id)?;
        let body = self.get(url.as_str()).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[async_trait]
impl SheetLoader for HttpSource {
    async fn load(&self, url: &str) -> Result<RgbaImage, TimelensError> {
        let body = self.get(url).await?;
        let image = image::load_from_memory(&body)
            .map_err(|e| TimelensError::ImageLoadError(format!("{}: {}", url, e)))?;
        Ok(image.to_rgba8())
    }
}

/// Build the info endpoint URL for a video.
pub fn info_request_url(base: &str, video_id: &str) -> Result<Url, TimelensError> {
    let mut url = Url::parse(base)
        .map_err(|e| TimelensError::ConfigError(format!("invalid info url {}: {}", base, e)))?;

    url.query_pairs_mut()
        .append_pair("video_id", video_id)
        .append_pair("asv", "3")
        .append_pair("el", "detailpage")
        .append_pair("hl", "en_US");

    Ok(url)
}
