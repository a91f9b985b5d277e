//! Lecture du flux : téléchargement HTTP(S) ou fichier local

use std::time::Duration;

use medfac::{FeedError, RawFeature};
use tracing::info;

use crate::config::{SourceConfig, SourceDescriptor};
use crate::retry::retry;
use crate::PipelineError;

/// Document brut du flux, avec son empreinte
#[derive(Debug, Clone)]
pub struct FeedDocument {
    /// URL ou chemin d'origine
    pub location: String,
    pub bytes: bytes::Bytes,
    /// blake3 du contenu brut, en hexadécimal
    pub checksum: String,
}

impl FeedDocument {
    pub fn new(location: impl Into<String>, bytes: bytes::Bytes) -> Self {
        let checksum = blake3::hash(&bytes).to_hex().to_string();
        Self {
            location: location.into(),
            bytes,
            checksum,
        }
    }

    /// Découpe le document en features brutes
    pub fn features(&self) -> Result<Vec<RawFeature>, FeedError> {
        medfac::parse(&self.bytes)
    }
}

/// Récupère le flux décrit par la configuration
///
/// # Errors
///
/// `SourceUnavailable` si le flux ne peut pas être lu après toutes les tentatives
/// (erreur réseau, statut HTTP non 2xx, fichier absent), `Timeout` si la lecture
/// d'un fichier dépasse le délai.
pub async fn fetch(config: &SourceConfig) -> Result<FeedDocument, PipelineError> {
    let descriptor = config.descriptor();
    let timeout = config.fetch_timeout();

    let document = match &descriptor {
        SourceDescriptor::Url(url) => {
            let client = http_client(timeout)?;
            let bytes = retry("feed download", config.max_attempts, config.backoff(), || {
                download(&client, url)
            })
            .await?;
            FeedDocument::new(url.clone(), bytes)
        }
        SourceDescriptor::File(path) => {
            let location = path.display().to_string();
            let bytes = tokio::time::timeout(timeout, tokio::fs::read(path))
                .await
                .map_err(|_| PipelineError::Timeout {
                    operation: "feed read",
                    timeout,
                })?
                .map_err(|e| PipelineError::source_unavailable(&location, e))?;
            FeedDocument::new(location, bytes.into())
        }
    };

    info!(
        source = %descriptor,
        bytes = document.bytes.len(),
        checksum = %document.checksum,
        "Feed fetched"
    );
    Ok(document)
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, PipelineError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .timeout(timeout)
        .user_agent(concat!("medfac-pg/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| PipelineError::Internal(format!("HTTP client: {e}")))
}

async fn download(client: &reqwest::Client, url: &str) -> Result<bytes::Bytes, PipelineError> {
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| PipelineError::source_unavailable(url, e))?;

    response
        .bytes()
        .await
        .map_err(|e| PipelineError::source_unavailable(url, e))
}
