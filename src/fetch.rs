//! Retrieval of upstream payloads.
//!
//! Adapters only see the [`Fetcher`] trait. [`HttpFetcher`] talks to the live
//! APIs; [`MemoryFetcher`] serves canned payloads keyed by URL for offline
//! runs and tests.

use std::{
    collections::HashMap,
    io::{Cursor, Read},
    time::Duration,
};

use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use reqwest::blocking::Client;
use zip::ZipArchive;

pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;

    /// Downloads an archive and returns one member's bytes.
    fn fetch_zip_member(&self, url: &str, member: &str) -> Result<Vec<u8>> {
        let archive = self.fetch(url)?;
        extract_zip_member(&archive, member).with_context(|| format!("Extracting from {url}"))
    }
}

/// Time limits for live requests. `request` bounds a whole API call body
/// included; bulk archives can run to hundreds of megabytes and get `bulk`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub request: Duration,
    pub bulk: Duration,
}

impl HttpTimeouts {
    pub fn from_secs(connect: u64, request: u64, bulk: u64) -> Result<Self> {
        if connect == 0 || request == 0 || bulk == 0 {
            bail!(
                "HTTP timeouts must be positive (connect {connect}s, request {request}s, bulk {bulk}s)"
            );
        }
        Ok(Self {
            connect: Duration::from_secs(connect),
            request: Duration::from_secs(request),
            bulk: Duration::from_secs(bulk.max(request)),
        })
    }
}

pub struct HttpFetcher {
    client: Client,
    timeouts: HttpTimeouts,
}

impl HttpFetcher {
    pub fn new(timeouts: HttpTimeouts) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeouts.connect)
            .user_agent(concat!("food-insecurity-etl/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Building HTTP client")?;
        Ok(Self { client, timeouts })
    }

    fn get(&self, url: &str, timeout: Duration) -> Result<Vec<u8>> {
        debug!("GET {url} (timeout {timeout:?})");
        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .with_context(|| format!("Request to {url} failed"))?;
        if !resp.status().is_success() {
            bail!("Request to {url} failed with status {}", resp.status());
        }
        let bytes = resp
            .bytes()
            .with_context(|| format!("Reading response body from {url}"))?;
        debug!("Fetched {} byte(s) from {url}", bytes.len());
        Ok(bytes.to_vec())
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.get(url, self.timeouts.request)
    }

    fn fetch_zip_member(&self, url: &str, member: &str) -> Result<Vec<u8>> {
        let archive = self.get(url, self.timeouts.bulk)?;
        extract_zip_member(&archive, member).with_context(|| format!("Extracting from {url}"))
    }
}

pub fn extract_zip_member(archive: &[u8], member: &str) -> Result<Vec<u8>> {
    let mut zip = ZipArchive::new(Cursor::new(archive)).context("Opening zip archive")?;
    let mut file = zip.by_name(member).map_err(|err| {
        anyhow!("Archive member '{member}' not available: {err}")
    })?;
    let mut out = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut out)
        .with_context(|| format!("Reading archive member '{member}'"))?;
    Ok(out)
}

#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    payloads: HashMap<String, Vec<u8>>,
    members: HashMap<(String, String), Vec<u8>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.payloads.insert(url.into(), body.into());
        self
    }

    pub fn with_member(
        mut self,
        url: impl Into<String>,
        member: impl Into<String>,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        self.members.insert((url.into(), member.into()), body.into());
        self
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.payloads
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("No payload registered for {url}"))
    }

    fn fetch_zip_member(&self, url: &str, member: &str) -> Result<Vec<u8>> {
        if let Some(body) = self.members.get(&(url.to_string(), member.to_string())) {
            return Ok(body.clone());
        }
        let archive = self.fetch(url)?;
        extract_zip_member(&archive, member).with_context(|| format!("Extracting from {url}"))
    }
}
