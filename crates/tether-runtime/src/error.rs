use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Artifact fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Module load failed: {0}")]
    Load(String),

    #[error("Instantiation failed: {0}")]
    InstantiationFailed(String),

    #[error("Tool not found: {0}")]
    UnknownTool(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RuntimeError {
    pub(crate) fn fetch(url: &str, reason: impl std::fmt::Display) -> Self {
        RuntimeError::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}
