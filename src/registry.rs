//! Tool registry: manifests plus their executors.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::types::ToolManifest;

/// Contract a registered tool must implement to be invoked by the orchestrator.
///
/// Kept deliberately narrow: the runtime never inspects what an executor does
/// internally, only the `Result` it returns.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, action: &str, args: &std::collections::BTreeMap<String, serde_json::Value>) -> anyhow::Result<serde_json::Value>;
}

/// Registry of declared tools with their manifests and executors.
///
/// `IndexMap` keeps registration order stable for `list_tools()`, matching
/// the deterministic iteration the policy engine's config tables rely on.
#[derive(Default)]
pub struct ToolRegistry {
    manifests: IndexMap<String, ToolManifest>,
    executors: IndexMap<String, Arc<dyn ToolExecutor>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, manifest: ToolManifest, executor: Option<Arc<dyn ToolExecutor>>) {
        let tool_id = manifest.tool_id.clone();
        self.manifests.insert(tool_id.clone(), manifest);
        if let Some(executor) = executor {
            self.executors.insert(tool_id, executor);
        }
    }

    pub fn manifest(&self, tool_id: &str) -> Option<&ToolManifest> {
        self.manifests.get(tool_id)
    }

    pub fn executor(&self, tool_id: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.executors.get(tool_id).cloned()
    }

    pub fn list_tools(&self) -> &IndexMap<String, ToolManifest> {
        &self.manifests
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BlastRadius;

    struct Echo;

    #[async_trait]
    impl ToolExecutor for Echo {
        async fn execute(&self, action: &str, _args: &std::collections::BTreeMap<String, serde_json::Value>) -> anyhow::Result<serde_json::Value> {
            Ok(serde_json::json!({ "action": action }))
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(
            ToolManifest::new("read_file", BlastRadius::Omega0, "reads a file"),
            Some(Arc::new(Echo)),
        );

        assert!(registry.manifest("read_file").is_some());
        assert!(registry.executor("read_file").is_some());
        assert!(registry.manifest("missing").is_none());
        assert_eq!(registry.list_tools().len(), 1);
    }
}
