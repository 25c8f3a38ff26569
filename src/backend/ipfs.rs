use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::ipfs::IpfsError;

use super::Probe;

#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "Pins", default)]
    pins: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    #[serde(rename = "Version")]
    version: String,
}

/// 单个内容存储节点（IPFS HTTP API）。
#[derive(Clone, Debug)]
pub struct IpfsBackend {
    base_url: Url,
    headers: HeaderMap,
    http: reqwest::Client,
    request_timeout: Duration,
}

impl IpfsBackend {
    pub fn new(
        http: reqwest::Client,
        base_url: Url,
        headers: &[(String, String)],
        request_timeout: Duration,
    ) -> Result<Self, IpfsError> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| IpfsError::Schema(format!("非法请求头 `{name}`: {err}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| IpfsError::Schema(format!("非法请求头值: {err}")))?;
            header_map.insert(name, value);
        }
        Ok(Self {
            base_url,
            headers: header_map,
            http,
            request_timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.base_url
    }

    pub async fn version(&self) -> Result<String, IpfsError> {
        let response: VersionResponse = self.post_json("api/v0/version", &[]).await?;
        Ok(response.version)
    }

    /// 上传一段内容，返回其内容寻址标识。
    pub async fn add(&self, payload: Vec<u8>) -> Result<String, IpfsError> {
        let url = self.endpoint("api/v0/add");
        let form = Form::new().part("file", Part::bytes(payload).file_name("payload"));
        let response = self
            .http
            .post(&url)
            .headers(self.headers.clone())
            .timeout(self.request_timeout)
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(IpfsError::Status {
                endpoint: url,
                status: response.status(),
            });
        }
        let added: AddResponse = response
            .json()
            .await
            .map_err(|err| IpfsError::Schema(format!("解析 add 响应失败: {err}")))?;
        debug!(target: "backend::ipfs", cid = %added.hash, "内容已上传");
        Ok(added.hash)
    }

    pub async fn pin(&self, cid: &str) -> Result<Vec<String>, IpfsError> {
        let response: PinResponse = self
            .post_json("api/v0/pin/add", &[("arg", cid)])
            .await?;
        Ok(response.pins)
    }

    pub async fn cat(&self, cid: &str) -> Result<Vec<u8>, IpfsError> {
        let url = self.endpoint("api/v0/cat");
        let response = self
            .http
            .post(&url)
            .headers(self.headers.clone())
            .timeout(self.request_timeout)
            .query(&[("arg", cid)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(IpfsError::Status {
                endpoint: url,
                status: response.status(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn post_json<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, IpfsError>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = self.endpoint(path);
        let mut request = self
            .http
            .post(&url)
            .headers(self.headers.clone())
            .timeout(self.request_timeout);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(IpfsError::Status {
                endpoint: url,
                status: response.status(),
            });
        }
        response
            .json()
            .await
            .map_err(|err| IpfsError::Schema(format!("解析 {path} 响应失败: {err}")))
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl Probe for IpfsBackend {
    async fn is_up(&self) -> bool {
        self.version().await.is_ok()
    }
}
