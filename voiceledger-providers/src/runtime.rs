use crate::request::{Body, HttpRequest};
use anyhow::{Context, anyhow};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

pub async fn execute(req: &HttpRequest) -> anyhow::Result<HttpResponse> {
    // Without an explicit timeout a broken endpoint would hold the call in Processing.
    let resp = send(req, Duration::from_secs(30)).await?;
    let status = resp.status().as_u16();
    let body = resp
        .bytes()
        .await
        .context("failed reading response body")?
        .to_vec();

    Ok(HttpResponse { status, body })
}

/// Sends the request and hands each body chunk to `on_chunk` as it arrives.
///
/// Non-2xx responses are read fully and returned as an error instead.
pub async fn execute_streaming<F>(req: &HttpRequest, mut on_chunk: F) -> anyhow::Result<u16>
where
    F: FnMut(&[u8]) -> anyhow::Result<()>,
{
    let resp = send(req, Duration::from_secs(120)).await?;
    let status = resp.status().as_u16();
    if !(200..=299).contains(&status) {
        let body = resp.bytes().await.unwrap_or_default();
        return Err(anyhow!(
            "streaming request failed: status={} body={}",
            status,
            String::from_utf8_lossy(&body)
        ));
    }

    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("failed reading response stream")?;
        on_chunk(&chunk)?;
    }
    Ok(status)
}

async fn send(req: &HttpRequest, timeout: Duration) -> anyhow::Result<reqwest::Response> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout)
        .build()
        .context("build http client")?;

    let mut headers = HeaderMap::new();
    for (k, v) in &req.headers {
        let name = HeaderName::from_bytes(k.as_bytes())
            .with_context(|| format!("invalid header name: {k}"))?;
        let value =
            HeaderValue::from_str(v).with_context(|| format!("invalid header value for {k}"))?;
        headers.insert(name, value);
    }

    let builder = match req.method.as_str() {
        "GET" => client.get(&req.url),
        "POST" => client.post(&req.url),
        other => return Err(anyhow!("unsupported method: {other}")),
    }
    .headers(headers);

    let builder = match &req.body {
        Body::Empty => builder,
        Body::Json(s) => builder.body(s.clone()),
    };

    log::debug!("http {} {}", req.method, req.url);
    builder.send().await.context("http request failed")
}
