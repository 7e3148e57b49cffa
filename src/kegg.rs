use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::domain::GenesetType;
use crate::error::KeggError;

pub const DEFAULT_KEGG_URL: &str = "https://rest.kegg.jp";

/// Plain-text access to the KEGG REST API.
pub trait KeggClient: Send + Sync {
    fn list(&self, geneset_type: &GenesetType) -> Result<String, KeggError>;
    fn list_for_organism(
        &self,
        geneset_type: &GenesetType,
        organism_code: &str,
    ) -> Result<String, KeggError>;
    fn link(&self, organism_code: &str, geneset_type: &GenesetType) -> Result<String, KeggError>;
    fn get_entry(&self, entry: &str) -> Result<String, KeggError>;
    fn info(&self) -> Result<String, KeggError>;
}

#[derive(Clone)]
pub struct KeggHttpClient {
    client: Client,
    base_url: String,
}

impl KeggHttpClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, KeggError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kegg-geneset/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KeggError::KeggHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| KeggError::KeggHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_text(&self, path: &str) -> Result<String, KeggError> {
        let url = format!("{}/{path}", self.base_url);
        debug!(%url, "requesting KEGG");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| KeggError::KeggHttp(format!("{url}: {err}")))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .ok()
                .filter(|body| !body.trim().is_empty())
                .unwrap_or_else(|| format!("failed to request {url}"));
            return Err(KeggError::KeggStatus { status, message });
        }
        response
            .text()
            .map_err(|err| KeggError::KeggHttp(format!("{url}: {err}")))
    }
}

impl KeggClient for KeggHttpClient {
    fn list(&self, geneset_type: &GenesetType) -> Result<String, KeggError> {
        self.get_text(&format!("list/{geneset_type}"))
    }

    fn list_for_organism(
        &self,
        geneset_type: &GenesetType,
        organism_code: &str,
    ) -> Result<String, KeggError> {
        self.get_text(&format!("list/{geneset_type}/{organism_code}"))
    }

    fn link(&self, organism_code: &str, geneset_type: &GenesetType) -> Result<String, KeggError> {
        self.get_text(&format!("link/{organism_code}/{geneset_type}"))
    }

    fn get_entry(&self, entry: &str) -> Result<String, KeggError> {
        self.get_text(&format!("get/{entry}"))
    }

    fn info(&self) -> Result<String, KeggError> {
        self.get_text("info/kegg")
    }
}
