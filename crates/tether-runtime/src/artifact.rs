use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::error::RuntimeError;

/// File extension every module artifact carries.
pub const MODULE_EXTENSION: &str = "wasm";

/// A module binary that is present on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    pub url: String,
    pub local_path: PathBuf,
}

/// Name-addressed local cache of module binaries.
///
/// Layout under `base_dir`:
/// ```text
/// {base_dir}/
///   weather-tool.wasm
///   activity-advisor.wasm
/// ```
///
/// The filename is derived from the URL's final path segment. Once a file
/// exists it is served as-is: there is no expiry and no revalidation against
/// the remote.
pub struct ArtifactCache {
    base_dir: PathBuf,
    http: reqwest::Client,
    /// Serializes cache misses so a filename is downloaded at most once.
    download_lock: Mutex<()>,
}

impl ArtifactCache {
    pub fn new(base_dir: PathBuf) -> Self {
        Self::with_client(base_dir, reqwest::Client::new())
    }

    pub fn with_client(base_dir: PathBuf, http: reqwest::Client) -> Self {
        Self {
            base_dir,
            http,
            download_lock: Mutex::new(()),
        }
    }

    /// Default cache location: ~/.tether/artifacts/
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tether")
            .join("artifacts")
    }

    pub fn init(&self) -> Result<(), RuntimeError> {
        std::fs::create_dir_all(&self.base_dir)?;
        Ok(())
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Where the artifact for `url` lives (or will live) on disk.
    pub fn local_path_for(&self, url: &str) -> Result<PathBuf, RuntimeError> {
        let filename = artifact_filename(url)
            .ok_or_else(|| RuntimeError::fetch(url, "URL has no file name segment"))?;
        Ok(self.base_dir.join(filename))
    }

    /// Return the local copy of `url`, downloading it on first use.
    pub async fn fetch(&self, url: &str) -> Result<CachedArtifact, RuntimeError> {
        let local_path = self.local_path_for(url)?;

        if local_path.exists() {
            tracing::debug!(url, path = %local_path.display(), "Artifact cache hit");
            return Ok(CachedArtifact {
                url: url.to_string(),
                local_path,
            });
        }

        let _guard = self.download_lock.lock().await;

        // Another task may have finished the same download while we waited.
        if local_path.exists() {
            tracing::debug!(url, path = %local_path.display(), "Artifact cache hit after wait");
            return Ok(CachedArtifact {
                url: url.to_string(),
                local_path,
            });
        }

        tracing::info!(url, "Downloading module artifact");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| RuntimeError::fetch(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RuntimeError::fetch(url, format!("server returned {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RuntimeError::fetch(url, e))?;

        self.persist(&local_path, &body)?;

        tracing::info!(
            url,
            path = %local_path.display(),
            bytes = body.len(),
            sha256 = %hex::encode(Sha256::digest(&body)),
            "Module artifact cached"
        );

        Ok(CachedArtifact {
            url: url.to_string(),
            local_path,
        })
    }

    /// Write to a temp file in the cache directory, then rename into place so
    /// a partial download never appears at `target`.
    fn persist(&self, target: &Path, bytes: &[u8]) -> Result<(), RuntimeError> {
        std::fs::create_dir_all(&self.base_dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.base_dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(target).map_err(|e| RuntimeError::Io(e.error))?;
        Ok(())
    }
}

/// Derive the cache filename for a module URL.
///
/// Uses the last non-empty path segment (query and fragment are ignored) and
/// appends `.wasm` when it is missing.
pub fn artifact_filename(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.rev().find(|s| !s.is_empty())?;
    if has_module_extension(segment) {
        Some(segment.to_string())
    } else {
        Some(format!("{segment}.{MODULE_EXTENSION}"))
    }
}

fn has_module_extension(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .is_some_and(|ext| ext == MODULE_EXTENSION)
}

/// Response of the blob store's upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub url: String,
    pub status: String,
}

/// Client for the HTTP blob store that hosts module binaries.
///
/// `GET {base}/binaries/{filename}` serves a module; `POST {base}/upload`
/// accepts a multipart `file` field.
pub struct BlobStoreClient {
    base_url: String,
    http: reqwest::Client,
}

impl BlobStoreClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    /// Download URL for a stored module.
    pub fn binary_url(&self, filename: &str) -> String {
        format!("{}/binaries/{filename}", self.base_url)
    }

    /// Upload a module binary. Files without the `.wasm` extension are
    /// rejected before any request is made.
    pub async fn upload(&self, path: &Path) -> Result<UploadReceipt, RuntimeError> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| RuntimeError::Upload(format!("{} has no file name", path.display())))?
            .to_string();

        if !has_module_extension(&filename) {
            return Err(RuntimeError::Upload(format!(
                "{filename}: module files must end in .{MODULE_EXTENSION}"
            )));
        }

        let bytes = tokio::fs::read(path).await?;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.clone())
            .mime_str("application/wasm")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = format!("{}/upload", self.base_url);
        tracing::info!(file = %filename, %url, "Uploading module");

        let response = self.http.post(&url).multipart(form).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RuntimeError::Upload(format!(
                "blob store returned {status}: {body}"
            )));
        }

        let receipt: UploadReceipt = response.json().await?;
        tracing::info!(file = %filename, url = %receipt.url, "Module uploaded");
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn filename_keeps_existing_extension() {
        assert_eq!(
            artifact_filename("http://localhost:8001/binaries/weather-tool.wasm").as_deref(),
            Some("weather-tool.wasm")
        );
    }

    #[test]
    fn filename_appends_extension_and_ignores_query() {
        assert_eq!(
            artifact_filename("https://example.com/modules/activity-advisor?v=3").as_deref(),
            Some("activity-advisor.wasm")
        );
        assert_eq!(
            artifact_filename("https://example.com/modules/activity-advisor/").as_deref(),
            Some("activity-advisor.wasm")
        );
    }

    #[test]
    fn filename_requires_a_path_segment() {
        assert!(artifact_filename("https://example.com/").is_none());
        assert!(artifact_filename("not a url").is_none());
    }

    #[tokio::test]
    async fn second_fetch_is_served_from_disk() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/binaries/weather-tool.wasm"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\0asm-module".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let cache = ArtifactCache::new(tmp.path().to_path_buf());
        cache.init().unwrap();

        let url = format!("{}/binaries/weather-tool.wasm", server.uri());
        let first = cache.fetch(&url).await.unwrap();
        let second = cache.fetch(&url).await.unwrap();

        assert_eq!(first.local_path, second.local_path);
        assert_eq!(first.local_path, tmp.path().join("weather-tool.wasm"));
        assert_eq!(std::fs::read(&first.local_path).unwrap(), b"\0asm-module");
        // MockServer verifies `expect(1)` on drop.
    }

    #[tokio::test]
    async fn concurrent_fetches_download_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/binaries/activity-advisor.wasm"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"bytes".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let cache = ArtifactCache::new(tmp.path().to_path_buf());
        cache.init().unwrap();

        let url = format!("{}/binaries/activity-advisor.wasm", server.uri());
        let (a, b) = tokio::join!(cache.fetch(&url), cache.fetch(&url));
        assert_eq!(a.unwrap().local_path, b.unwrap().local_path);
    }

    #[tokio::test]
    async fn failed_download_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/binaries/missing.wasm"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let cache = ArtifactCache::new(tmp.path().to_path_buf());
        cache.init().unwrap();

        let url = format!("{}/binaries/missing.wasm", server.uri());
        let err = cache.fetch(&url).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Fetch { .. }), "got {err:?}");
        assert!(!tmp.path().join("missing.wasm").exists());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn upload_posts_multipart_and_returns_receipt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "url": "http://localhost:8001/binaries/weather-tool.wasm",
                "status": "success"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("weather-tool.wasm");
        std::fs::write(&file, b"\0asm").unwrap();

        let client = BlobStoreClient::new(format!("{}/", server.uri()));
        let receipt = client.upload(&file).await.unwrap();
        assert_eq!(receipt.status, "success");
        assert!(receipt.url.ends_with("/binaries/weather-tool.wasm"));
    }

    #[tokio::test]
    async fn upload_rejects_wrong_extension_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("notes.txt");
        std::fs::write(&file, b"hello").unwrap();

        let client = BlobStoreClient::new(server.uri());
        let err = client.upload(&file).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Upload(_)));
    }

    #[tokio::test]
    async fn upload_surfaces_client_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Invalid file type"))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("tool.wasm");
        std::fs::write(&file, b"\0asm").unwrap();

        let client = BlobStoreClient::new(server.uri());
        let err = client.upload(&file).await.unwrap_err();
        assert!(err.to_string().contains("400"), "got {err}");
    }

    #[test]
    fn binary_url_joins_base() {
        let client = BlobStoreClient::new("http://localhost:8001/");
        assert_eq!(
            client.binary_url("weather-tool.wasm"),
            "http://localhost:8001/binaries/weather-tool.wasm"
        );
    }
}
