//! In-memory pipeline catalog.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::core::pipeline::{PipelineCatalog, PipelineId, PipelineInfo};

/// Catalog backed by a map; suits tests and embedding hosts that push their
/// pipeline list in.
#[derive(Debug, Default)]
pub struct InMemoryPipelineCatalog {
    pipelines: RwLock<BTreeMap<PipelineId, PipelineInfo>>,
}

impl InMemoryPipelineCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding `pipelines`.
    pub fn with_pipelines(pipelines: impl IntoIterator<Item = PipelineInfo>) -> Self {
        let catalog = Self::new();
        for pipeline in pipelines {
            catalog.insert(pipeline);
        }
        catalog
    }

    /// Add or replace a pipeline.
    pub fn insert(&self, pipeline: PipelineInfo) {
        self.pipelines.write().insert(pipeline.id.clone(), pipeline);
    }

    /// Forget a pipeline.
    pub fn remove(&self, id: &str) -> Option<PipelineInfo> {
        self.pipelines.write().remove(id)
    }

    /// Number of pipelines.
    pub fn len(&self) -> usize {
        self.pipelines.read().len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.pipelines.read().is_empty()
    }
}

impl PipelineCatalog for InMemoryPipelineCatalog {
    fn find(&self, id: &str) -> Option<PipelineInfo> {
        self.pipelines.read().get(id).cloned()
    }

    fn all(&self) -> Vec<PipelineInfo> {
        self.pipelines.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_listing() {
        let catalog = InMemoryPipelineCatalog::with_pipelines([
            PipelineInfo::new("bt2", "B"),
            PipelineInfo::new("bt1", "A"),
        ]);
        assert_eq!(catalog.find("bt1").map(|p| p.full_name), Some("A".to_string()));
        assert_eq!(
            catalog.all().into_iter().map(|p| p.id).collect::<Vec<_>>(),
            vec!["bt1", "bt2"]
        );
        assert!(catalog.remove("bt1").is_some());
        assert_eq!(catalog.len(), 1);
    }
}
