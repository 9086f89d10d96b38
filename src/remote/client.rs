use reqwest::blocking::{Client, ClientBuilder, Response};

use super::pktline::{encode, FLUSH};
use crate::config::GitcoreConfig;
use crate::error::{Error, Result};
use crate::object::is_valid_object_id;

const UPLOAD_PACK_SERVICE: &str = "git-upload-pack";
const UPLOAD_PACK_REQUEST_TYPE: &str = "application/x-git-upload-pack-request";

/// Body of a single-want `git-upload-pack` request without capabilities
pub fn upload_pack_request(wanted: &str) -> Vec<u8> {
    let mut body = encode(format!("want {}\n", wanted).as_bytes());
    body.extend_from_slice(FLUSH);
    body.extend(encode(b"done\n"));
    body
}

/// Blocking client for a smart HTTP remote
pub struct RemoteClient {
    http: Client,
    base_url: String,
}

fn client_builder(config: &GitcoreConfig) -> ClientBuilder {
    Client::builder()
        .timeout(config.http_timeout())
        .user_agent(config.user_agent.as_str())
}

impl RemoteClient {
    pub fn new(url: &str, config: &GitcoreConfig) -> Result<Self> {
        Self::with_builder(url, client_builder(config))
    }

    fn with_builder(url: &str, builder: ClientBuilder) -> Result<Self> {
        Ok(Self {
            http: builder.build()?,
            base_url: url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET the ref advertisement
    pub fn fetch_refs(&self) -> Result<Vec<u8>> {
        let url = format!("{}/info/refs?service={}", self.base_url, UPLOAD_PACK_SERVICE);
        tracing::info!("fetching refs from {}", url);
        let response = self.http.get(&url).send()?;
        read_body(&url, response)
    }

    /// POST a want for one object and return the raw response (NAK line + pack)
    pub fn fetch_pack(&self, wanted: &str) -> Result<Vec<u8>> {
        if !is_valid_object_id(wanted) {
            return Err(Error::Network(format!("refusing to request invalid object id {:?}", wanted)));
        }
        let url = format!("{}/{}", self.base_url, UPLOAD_PACK_SERVICE);
        tracing::info!("requesting pack for {} from {}", wanted, url);
        let response = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, UPLOAD_PACK_REQUEST_TYPE)
            .body(upload_pack_request(wanted))
            .send()?;
        read_body(&url, response)
    }
}

fn read_body(url: &str, response: Response) -> Result<Vec<u8>> {
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Network(format!("{} returned HTTP {}", url, status)));
    }
    let body = response.bytes()?;
    tracing::debug!("received {} bytes from {}", body.len(), url);
    Ok(body.to_vec())
}
