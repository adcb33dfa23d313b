//! Agent registry mapping names to analysis capabilities.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{AgentError, AnalysisResult};
use crate::persona::{builtin_personas, PersonaAgent, PersonaConfig};
use crate::traits::AnalysisAgent;

/// A registry of analysis agents.
///
/// The registry maps agent names to their implementations. The workflow
/// dispatches to whatever is registered, so adding or removing an agent never
/// touches the dispatcher.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<String, Arc<dyn AnalysisAgent>>,
}

impl AgentRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            agents: BTreeMap::new(),
        }
    }

    /// Registry holding one [`PersonaAgent`] per built-in persona.
    pub fn builtin() -> AnalysisResult<Self> {
        Self::from_personas(builtin_personas())
    }

    /// Build a registry from persona configurations.
    pub fn from_personas(personas: impl IntoIterator<Item = PersonaConfig>) -> AnalysisResult<Self> {
        let mut registry = Self::new();
        for config in personas {
            registry.register(Arc::new(PersonaAgent::new(config)?));
        }
        Ok(registry)
    }

    /// Load persona agents from every YAML file in `dir`.
    ///
    /// Files named `agent-schema*` are skipped, as are files that fail to
    /// parse or carry no persona key.
    pub fn load_from_dir(dir: &Path) -> AnalysisResult<Self> {
        if !dir.is_dir() {
            return Err(AgentError::config_file(dir, "agents directory not found"));
        }

        let mut registry = Self::new();
        for entry in WalkDir::new(dir).max_depth(1).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }

            let is_yaml = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("yml")
            );
            let file_name = entry.file_name().to_string_lossy();
            if !is_yaml || file_name.starts_with("agent-schema") {
                continue;
            }

            let config = match PersonaConfig::from_file(path) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Skipping agent file {}: {}", path.display(), e);
                    continue;
                }
            };

            if config.persona.trim().is_empty() {
                warn!("Skipping agent file {}: no persona", path.display());
                continue;
            }

            match PersonaAgent::new(config) {
                Ok(agent) => {
                    info!("Loaded agent config: {}", agent.name());
                    registry.register(Arc::new(agent));
                }
                Err(e) => warn!("Skipping agent file {}: {}", path.display(), e),
            }
        }

        Ok(registry)
    }

    /// Register an agent under its `name()`.
    ///
    /// If an agent with the same name already exists, it will be replaced.
    pub fn register(&mut self, agent: Arc<dyn AnalysisAgent>) {
        let name = agent.name().to_string();
        debug!("Registering agent: {}", name);
        self.agents.insert(name, agent);
    }

    /// Get an agent by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn AnalysisAgent>> {
        self.agents.get(name).cloned()
    }

    /// Get an agent by name, returning an error if not found.
    pub fn get_required(&self, name: &str) -> AnalysisResult<Arc<dyn AnalysisAgent>> {
        self.get(name)
            .ok_or_else(|| AgentError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.agents.keys().map(|s| s.as_str()).collect()
    }

    /// Registered agents in name order.
    pub fn agents(&self) -> Vec<Arc<dyn AnalysisAgent>> {
        self.agents.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Remove an agent from the registry.
    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn AnalysisAgent>> {
        debug!("Unregistering agent: {}", name);
        self.agents.remove(name)
    }

    /// Sub-registry holding only the named agents.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> AnalysisResult<Self> {
        let mut selected = Self::new();
        for name in names {
            selected.register(self.get_required(name.as_ref())?);
        }
        Ok(selected)
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedAgent;
    use serde_json::json;

    fn agent(name: &str) -> Arc<dyn AnalysisAgent> {
        Arc::new(ScriptedAgent::succeeding(name, json!({})))
    }

    #[test]
    fn test_registry_register() {
        let mut registry = AgentRegistry::new();
        assert!(registry.is_empty());

        registry.register(agent("architect"));
        registry.register(agent("architect"));

        assert_eq!(registry.len(), 1);
        assert!(registry.contains("architect"));
    }

    #[test]
    fn test_registry_names_sorted() {
        let mut registry = AgentRegistry::new();
        registry.register(agent("uxd"));
        registry.register(agent("SRE"));
        registry.register(agent("architect"));

        assert_eq!(registry.names(), vec!["SRE", "architect", "uxd"]);
    }

    #[test]
    fn test_registry_get_required() {
        let mut registry = AgentRegistry::new();
        registry.register(agent("qa"));

        assert_eq!(registry.get_required("qa").unwrap().name(), "qa");
        assert!(matches!(
            registry.get_required("missing"),
            Err(AgentError::NotFound(_))
        ));
    }

    #[test]
    fn test_registry_select_and_unregister() {
        let mut registry = AgentRegistry::new();
        registry.register(agent("a"));
        registry.register(agent("b"));
        registry.register(agent("c"));

        let selected = registry.select(&["a", "c"]).unwrap();
        assert_eq!(selected.names(), vec!["a", "c"]);
        assert!(registry.select(&["a", "zzz"]).is_err());

        registry.unregister("b");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_builtin_registry() {
        let registry = AgentRegistry::builtin().unwrap();
        assert_eq!(registry.len(), 15);
        assert!(registry.contains("STAFF_ENGINEER"));
        assert!(registry.contains("uxd"));
    }
}
