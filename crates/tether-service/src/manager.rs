use std::sync::Arc;

use tether_core::{ToolSource, ToolSpec};

use crate::catalog::ToolCatalog;
use crate::error::ServiceError;
use crate::session::{SessionConnector, ToolSession};

/// Owns the runtime sessions for the life of the service.
pub struct SessionManager {
    connector: Arc<dyn SessionConnector>,
    sessions: Vec<Arc<dyn ToolSession>>,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            connector,
            sessions: Vec::new(),
        }
    }

    /// Open a session per source and catalogue the tools each one lists.
    ///
    /// Sources are started in order, so on a name collision the later
    /// source owns the tool. A source that fails to connect or list is
    /// logged and skipped; the rest still start.
    pub async fn start_all(&mut self, sources: &[ToolSource]) -> ToolCatalog {
        let mut catalog = ToolCatalog::new();

        for source in sources {
            match self.start_one(source).await {
                Ok((session, specs)) => {
                    tracing::info!(
                        source = %source.name,
                        tools = ?specs.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
                        "Tool source ready"
                    );
                    for spec in specs {
                        catalog.register(spec, Arc::clone(&session));
                    }
                    self.sessions.push(session);
                }
                Err(e) => {
                    tracing::warn!(source = %source.name, error = %e, "Tool source unavailable; skipping");
                }
            }
        }

        tracing::info!(
            sources = sources.len(),
            connected = self.sessions.len(),
            tools = catalog.len(),
            "Session startup complete"
        );
        catalog
    }

    async fn start_one(
        &self,
        source: &ToolSource,
    ) -> Result<(Arc<dyn ToolSession>, Vec<ToolSpec>), ServiceError> {
        tracing::info!(source = %source.name, url = %source.binary_url, "Connecting to tool source");
        let session = self.connector.connect(source).await?;

        match session.list_tools().await {
            Ok(specs) => Ok((session, specs)),
            Err(e) => {
                if let Err(close_err) = session.close().await {
                    tracing::debug!(source = %source.name, error = %close_err, "Close after failed listing");
                }
                Err(ServiceError::connect(&source.name, e))
            }
        }
    }

    pub fn sessions(&self) -> &[Arc<dyn ToolSession>] {
        &self.sessions
    }

    /// Close every open session. Failures are logged, never returned.
    pub async fn shutdown(&mut self) {
        for session in self.sessions.drain(..) {
            match session.close().await {
                Ok(()) => tracing::debug!(source = %session.source_name(), "Session closed"),
                Err(e) => {
                    tracing::warn!(source = %session.source_name(), error = %e, "Session close failed");
                }
            }
        }
    }
}
