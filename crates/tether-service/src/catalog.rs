use std::collections::BTreeMap;
use std::sync::Arc;

use tether_core::ToolSpec;

use crate::session::ToolSession;

/// A catalogued tool and the session that serves it.
#[derive(Clone)]
pub struct CatalogEntry {
    pub spec: ToolSpec,
    pub session: Arc<dyn ToolSession>,
}

impl std::fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("tool", &self.spec.name)
            .field("source", &self.session.source_name())
            .finish()
    }
}

/// Tool name → schema and owning session, aggregated across every connected
/// source.
///
/// Built once at startup and shared read-only afterwards. Names are unique:
/// when two sources advertise the same tool, the one registered last owns it.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `spec`, owned by `session`. Returns the source that previously
    /// owned the name, if any.
    pub fn register(&mut self, spec: ToolSpec, session: Arc<dyn ToolSession>) -> Option<String> {
        let name = spec.name.clone();
        let new_source = session.source_name().to_string();
        let displaced = self
            .entries
            .insert(name.clone(), CatalogEntry { spec, session })
            .map(|previous| previous.session.source_name().to_string());

        if let Some(previous) = &displaced {
            tracing::warn!(
                tool = %name,
                previous = %previous,
                source = %new_source,
                "Tool name collision; later source wins"
            );
        }
        displaced
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.get(name)
    }

    /// Name of the source serving `name`.
    pub fn owner(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|e| e.session.source_name())
    }

    /// Every catalogued schema, ordered by name.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.entries.values().map(|e| e.spec.clone()).collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeSession, spec};

    #[test]
    fn disjoint_sources_are_unioned() {
        let weather = FakeSession::new("weather-tool").into_arc();
        let activity = FakeSession::new("activity-advisor").into_arc();

        let mut catalog = ToolCatalog::new();
        assert!(catalog.register(spec("get_weather"), weather).is_none());
        assert!(catalog.register(spec("get_activity_recommendation"), activity).is_none());

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.owner("get_weather"), Some("weather-tool"));
        assert_eq!(catalog.owner("get_activity_recommendation"), Some("activity-advisor"));
        assert_eq!(
            catalog.names().collect::<Vec<_>>(),
            vec!["get_activity_recommendation", "get_weather"]
        );
    }

    #[test]
    fn later_registration_wins_a_collision() {
        let first = FakeSession::new("weather-v1").into_arc();
        let second = FakeSession::new("weather-v2").into_arc();

        let mut catalog = ToolCatalog::new();
        catalog.register(spec("get_weather"), first);
        let displaced = catalog.register(spec("get_weather"), second);

        assert_eq!(displaced.as_deref(), Some("weather-v1"));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.owner("get_weather"), Some("weather-v2"));
    }

    #[test]
    fn unknown_name_is_absent() {
        let catalog = ToolCatalog::new();
        assert!(catalog.is_empty());
        assert!(catalog.get("get_weather").is_none());
        assert!(catalog.owner("get_weather").is_none());
    }
}
