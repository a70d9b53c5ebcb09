//! In-memory resource registry.
//!
//! Keeps resources keyed by id and enforces that ids, names and `host:port`
//! pairs are each unique. Mutations are validated under a single write lock;
//! listeners are notified after the lock is released.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::core::notify::ListenerSet;
use crate::core::pipeline::PipelineCatalog;
use crate::core::resource::{
    parse_build_limit, parse_port, validate_host, validate_name, MatchRule, Resource,
};
use crate::core::RegistryError;

/// Read-only view of the registry used by the monitor and the gates.
pub trait ResourceLookup: Send + Sync {
    /// Resource the pipeline is linked to, explicitly or through a rule.
    fn find_by_pipeline_id(&self, pipeline: &str) -> Option<Resource>;
    /// Every registered resource.
    fn all(&self) -> Vec<Resource>;
    /// Resource by id.
    fn get_by_id(&self, id: &str) -> Option<Resource>;
}

/// Receives registry mutations.
pub trait RegistryListener: Send + Sync {
    /// A resource was added.
    fn resource_added(&self, _resource: &Resource) {}
    /// A resource was changed.
    fn resource_updated(&self, _resource: &Resource) {}
    /// A resource was removed.
    fn resource_removed(&self, _resource: &Resource) {}
}

#[derive(Default)]
struct Entries {
    resources: BTreeMap<String, Resource>,
    names: HashSet<String>,
    addresses: HashSet<String>,
}

impl Entries {
    fn check_unique(&self, resource: &Resource) -> Result<(), RegistryError> {
        if self.resources.contains_key(resource.id()) {
            return Err(RegistryError::DuplicateId(resource.id().to_string()));
        }
        if self.names.contains(resource.name()) {
            return Err(RegistryError::DuplicateName(resource.name().to_string()));
        }
        if self.addresses.contains(&resource.address()) {
            return Err(RegistryError::DuplicateAddress {
                host: resource.host().to_string(),
                port: resource.port(),
            });
        }
        Ok(())
    }

    fn insert(&mut self, resource: Resource) {
        self.names.insert(resource.name().to_string());
        self.addresses.insert(resource.address());
        self.resources.insert(resource.id().to_string(), resource);
    }

    fn next_id(&self) -> String {
        let highest = self
            .resources
            .keys()
            .filter_map(|id| id.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        (highest + 1).to_string()
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Resource, RegistryError> {
        self.resources
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownResource(id.to_string()))
    }
}

enum Change {
    Added(Resource),
    Updated(Resource),
    Removed(Resource),
}

/// Registry of monitored resources.
pub struct ResourceRegistry {
    entries: RwLock<Entries>,
    catalog: Option<Arc<dyn PipelineCatalog>>,
    listeners: ListenerSet<dyn RegistryListener>,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceRegistry {
    /// Registry that accepts any pipeline id and links by explicit id only.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            catalog: None,
            listeners: ListenerSet::new(),
        }
    }

    /// Registry that validates pipeline ids and resolves name-match rules
    /// against the host's catalog.
    pub fn with_catalog(catalog: Arc<dyn PipelineCatalog>) -> Self {
        Self {
            catalog: Some(catalog),
            ..Self::new()
        }
    }

    /// Pipeline catalog, if one is attached.
    pub fn catalog(&self) -> Option<&dyn PipelineCatalog> {
        self.catalog.as_deref()
    }

    /// Register a mutation listener.
    pub fn add_listener(&self, listener: Arc<dyn RegistryListener>) {
        self.listeners.add(listener);
    }

    /// Add a fully built resource.
    ///
    /// # Errors
    ///
    /// Fails when the id, name or address is already taken.
    pub fn add(&self, resource: Resource) -> Result<(), RegistryError> {
        {
            let mut entries = self.entries.write();
            entries.check_unique(&resource)?;
            entries.insert(resource.clone());
        }
        info!(resource = %resource.name(), id = %resource.id(), address = %resource.address(), "resource added");
        self.publish(Change::Added(resource));
        Ok(())
    }

    /// Add a resource from operator input, assigning the next numeric id.
    ///
    /// # Errors
    ///
    /// Fails on malformed input or a uniqueness violation.
    pub fn add_new(&self, name: &str, host: &str, port: &str, build_limit: &str) -> Result<Resource, RegistryError> {
        let port = parse_port(port)?;
        let build_limit = parse_build_limit(build_limit)?;
        let resource = {
            let mut entries = self.entries.write();
            let resource = Resource::new(entries.next_id(), name, host, port)?.with_build_limit(build_limit);
            entries.check_unique(&resource)?;
            entries.insert(resource.clone());
            resource
        };
        info!(resource = %resource.name(), id = %resource.id(), address = %resource.address(), "resource added");
        self.publish(Change::Added(resource.clone()));
        Ok(resource)
    }

    /// Change name, address and limit of an existing resource.
    ///
    /// # Errors
    ///
    /// Fails for an unknown id, malformed input, or a name or address owned
    /// by another resource.
    pub fn update(
        &self,
        id: &str,
        name: &str,
        host: &str,
        port: &str,
        build_limit: &str,
    ) -> Result<Resource, RegistryError> {
        validate_name(name)?;
        validate_host(host)?;
        let port = parse_port(port)?;
        let build_limit = parse_build_limit(build_limit)?;

        let updated = {
            let mut entries = self.entries.write();
            let current = entries
                .resources
                .get(id)
                .ok_or_else(|| RegistryError::UnknownResource(id.to_string()))?;
            let old_name = current.name().to_string();
            let old_address = current.address();
            let new_address = format!("{host}:{port}");

            if name != old_name && entries.names.contains(name) {
                return Err(RegistryError::DuplicateName(name.to_string()));
            }
            if new_address != old_address && entries.addresses.contains(&new_address) {
                return Err(RegistryError::DuplicateAddress {
                    host: host.to_string(),
                    port,
                });
            }

            let resource = entries.get_mut(id)?;
            resource.set_identity(name.to_string(), host.to_string(), port, build_limit);
            let updated = resource.clone();

            entries.names.remove(&old_name);
            entries.names.insert(name.to_string());
            entries.addresses.remove(&old_address);
            entries.addresses.insert(new_address);
            updated
        };
        info!(resource = %updated.name(), id, "resource updated");
        self.publish(Change::Updated(updated.clone()));
        Ok(updated)
    }

    /// Remove a resource.
    ///
    /// # Errors
    ///
    /// Fails for an unknown id.
    pub fn remove(&self, id: &str) -> Result<Resource, RegistryError> {
        let removed = {
            let mut entries = self.entries.write();
            let removed = entries
                .resources
                .remove(id)
                .ok_or_else(|| RegistryError::UnknownResource(id.to_string()))?;
            entries.names.remove(removed.name());
            entries.addresses.remove(&removed.address());
            removed
        };
        info!(resource = %removed.name(), id, "resource removed");
        self.publish(Change::Removed(removed.clone()));
        Ok(removed)
    }

    /// Link a pipeline to a resource.
    ///
    /// # Errors
    ///
    /// Fails for an unknown resource, or a pipeline the catalog does not know.
    pub fn link_pipeline(&self, id: &str, pipeline: &str) -> Result<(), RegistryError> {
        self.check_pipeline(pipeline)?;
        self.modify(id, |resource| resource.link_pipeline(pipeline))
    }

    /// Unlink a pipeline from a resource.
    ///
    /// # Errors
    ///
    /// Fails for an unknown resource, or a pipeline the catalog does not know.
    pub fn unlink_pipeline(&self, id: &str, pipeline: &str) -> Result<(), RegistryError> {
        self.check_pipeline(pipeline)?;
        self.modify(id, |resource| resource.unlink_pipeline(pipeline))
    }

    /// Add a name-match rule to a resource.
    ///
    /// # Errors
    ///
    /// Fails for an unknown resource or an invalid expression.
    pub fn add_match_rule(&self, id: &str, pattern: &str) -> Result<(), RegistryError> {
        let rule = MatchRule::new(pattern)?;
        self.modify(id, |resource| resource.add_match_rule(rule))
    }

    /// Remove a name-match rule from a resource.
    ///
    /// # Errors
    ///
    /// Fails for an unknown resource.
    pub fn remove_match_rule(&self, id: &str, pattern: &str) -> Result<(), RegistryError> {
        self.modify(id, |resource| resource.remove_match_rule(pattern))
    }

    /// Persist the administrative flag. Hosts go through
    /// `Engine::set_enabled`, which also updates the runtime record.
    ///
    /// # Errors
    ///
    /// Fails for an unknown resource.
    pub(crate) fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), RegistryError> {
        self.modify(id, |resource| {
            let changed = resource.is_enabled() != enabled;
            resource.set_enabled(enabled);
            changed
        })
    }

    /// Drop a pipeline that no longer exists from every resource.
    pub fn unregister_pipeline(&self, pipeline: &str) -> usize {
        let changed: Vec<Resource> = {
            let mut entries = self.entries.write();
            entries
                .resources
                .values_mut()
                .filter_map(|resource| resource.unlink_pipeline(pipeline).then(|| resource.clone()))
                .collect()
        };
        if !changed.is_empty() {
            debug!(pipeline, resources = changed.len(), "pipeline unregistered");
        }
        let count = changed.len();
        for resource in changed {
            self.publish(Change::Updated(resource));
        }
        count
    }

    /// Replace the whole registry, typically after a configuration reload.
    ///
    /// Entries that repeat an earlier id, name or address are skipped, and
    /// links to pipelines unknown to the catalog are pruned. Listeners hear
    /// `removed` for ids that disappear, `updated` for ids that remain and
    /// `added` for new ids. Returns the number of resources loaded.
    pub fn replace_all(&self, resources: Vec<Resource>) -> usize {
        let mut loaded = Entries::default();
        for mut resource in resources {
            if let Err(e) = loaded.check_unique(&resource) {
                warn!(resource = %resource.name(), error = %e, "skipping resource");
                continue;
            }
            if let Some(catalog) = self.catalog() {
                let unknown: Vec<String> = resource
                    .pipelines()
                    .iter()
                    .filter(|p| catalog.find(p).is_none())
                    .cloned()
                    .collect();
                for pipeline in unknown {
                    debug!(resource = %resource.name(), %pipeline, "dropping link to unknown pipeline");
                    resource.unlink_pipeline(&pipeline);
                }
            }
            loaded.insert(resource);
        }

        let previous = {
            let mut entries = self.entries.write();
            std::mem::replace(&mut *entries, loaded).resources
        };

        let current = self.all();
        for (id, resource) in &previous {
            if !current.iter().any(|r| r.id() == id) {
                self.publish(Change::Removed(resource.clone()));
            }
        }
        for resource in &current {
            if previous.contains_key(resource.id()) {
                self.publish(Change::Updated(resource.clone()));
            } else {
                self.publish(Change::Added(resource.clone()));
            }
        }
        info!(resources = current.len(), "registry replaced");
        current.len()
    }

    /// Next numeric id: one past the highest numeric id in use.
    pub fn next_id(&self) -> String {
        self.entries.read().next_id()
    }

    /// Number of registered resources.
    pub fn len(&self) -> usize {
        self.entries.read().resources.len()
    }

    /// Whether no resource is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().resources.is_empty()
    }

    fn check_pipeline(&self, pipeline: &str) -> Result<(), RegistryError> {
        match self.catalog() {
            Some(catalog) if catalog.find(pipeline).is_none() => {
                Err(RegistryError::UnknownPipeline(pipeline.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn modify(&self, id: &str, f: impl FnOnce(&mut Resource) -> bool) -> Result<(), RegistryError> {
        let changed = {
            let mut entries = self.entries.write();
            let resource = entries.get_mut(id)?;
            f(&mut *resource).then(|| resource.clone())
        };
        if let Some(resource) = changed {
            self.publish(Change::Updated(resource));
        }
        Ok(())
    }

    fn publish(&self, change: Change) {
        match change {
            Change::Added(r) => self.listeners.notify(|l| l.resource_added(&r)),
            Change::Updated(r) => self.listeners.notify(|l| l.resource_updated(&r)),
            Change::Removed(r) => self.listeners.notify(|l| l.resource_removed(&r)),
        }
    }
}

impl ResourceLookup for ResourceRegistry {
    fn find_by_pipeline_id(&self, pipeline: &str) -> Option<Resource> {
        let entries = self.entries.read();
        if let Some(resource) = entries.resources.values().find(|r| r.links(pipeline)) {
            return Some(resource.clone());
        }
        let info = self.catalog()?.find(pipeline)?;
        entries
            .resources
            .values()
            .find(|r| r.matches_name(&info.full_name))
            .cloned()
    }

    fn all(&self) -> Vec<Resource> {
        self.entries.read().resources.values().cloned().collect()
    }

    fn get_by_id(&self, id: &str) -> Option<Resource> {
        self.entries.read().resources.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::PipelineInfo;
    use crate::infra::catalog::InMemoryPipelineCatalog;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Changes(Mutex<Vec<String>>);

    impl RegistryListener for Changes {
        fn resource_added(&self, r: &Resource) {
            self.0.lock().push(format!("added:{}", r.id()));
        }
        fn resource_updated(&self, r: &Resource) {
            self.0.lock().push(format!("updated:{}", r.id()));
        }
        fn resource_removed(&self, r: &Resource) {
            self.0.lock().push(format!("removed:{}", r.id()));
        }
    }

    fn resource(id: &str, name: &str, port: u16) -> Resource {
        Resource::new(id, name, "localhost", port).unwrap()
    }

    #[test]
    fn test_enforces_uniqueness() {
        let registry = ResourceRegistry::new();
        registry.add(resource("1", "db", 5432)).unwrap();

        assert_eq!(
            registry.add(resource("1", "other", 5433)),
            Err(RegistryError::DuplicateId("1".into()))
        );
        assert_eq!(
            registry.add(resource("2", "db", 5433)),
            Err(RegistryError::DuplicateName("db".into()))
        );
        assert_eq!(
            registry.add(resource("2", "other", 5432)),
            Err(RegistryError::DuplicateAddress { host: "localhost".into(), port: 5432 })
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_assigns_sequential_ids() {
        let registry = ResourceRegistry::new();
        let first = registry.add_new("db", "localhost", "5432", "").unwrap();
        let second = registry.add_new("cache", "localhost", "6379", "2").unwrap();
        assert_eq!(first.id(), "1");
        assert_eq!(second.id(), "2");
        assert_eq!(second.build_limit(), 2);
        assert_eq!(registry.next_id(), "3");
        assert!(matches!(
            registry.add_new("bad", "localhost", "port", ""),
            Err(RegistryError::InvalidPort(_))
        ));
    }

    #[test]
    fn test_update_may_keep_its_own_name_and_address() {
        let registry = ResourceRegistry::new();
        registry.add(resource("1", "db", 5432)).unwrap();
        registry.add(resource("2", "cache", 6379)).unwrap();

        let updated = registry.update("1", "db", "localhost", "5432", "4").unwrap();
        assert_eq!(updated.build_limit(), 4);

        assert_eq!(
            registry.update("1", "cache", "localhost", "5432", ""),
            Err(RegistryError::DuplicateName("cache".into()))
        );
        assert!(matches!(
            registry.update("1", "db", "localhost", "6379", ""),
            Err(RegistryError::DuplicateAddress { .. })
        ));
        assert_eq!(
            registry.update("9", "x", "localhost", "1", ""),
            Err(RegistryError::UnknownResource("9".into()))
        );

        registry.update("1", "database", "db.internal", "5433", "").unwrap();
        registry.add(resource("3", "db", 5432)).unwrap();
    }

    #[test]
    fn test_notifies_listeners_of_each_mutation() {
        let registry = ResourceRegistry::new();
        let changes = Arc::new(Changes::default());
        registry.add_listener(changes.clone());

        registry.add(resource("1", "db", 5432)).unwrap();
        registry.link_pipeline("1", "bt1").unwrap();
        registry.link_pipeline("1", "bt1").unwrap();
        registry.remove("1").unwrap();

        assert_eq!(*changes.0.lock(), vec!["added:1", "updated:1", "removed:1"]);
        assert_eq!(registry.remove("1"), Err(RegistryError::UnknownResource("1".into())));
    }

    #[test]
    fn test_finds_explicit_links_before_rules() {
        let catalog = Arc::new(InMemoryPipelineCatalog::new());
        catalog.insert(PipelineInfo::new("bt1", "Backend :: Integration"));
        catalog.insert(PipelineInfo::new("bt2", "Backend :: Nightly Integration"));
        let registry = ResourceRegistry::with_catalog(catalog);

        registry
            .add(resource("1", "rules", 5432).with_match_rule(MatchRule::new("Integration").unwrap()))
            .unwrap();
        registry.add(resource("2", "explicit", 5433).with_pipeline("bt1")).unwrap();

        assert_eq!(registry.find_by_pipeline_id("bt1").unwrap().id(), "2");
        assert_eq!(registry.find_by_pipeline_id("bt2").unwrap().id(), "1");
        assert!(registry.find_by_pipeline_id("bt3").is_none());
    }

    #[test]
    fn test_catalog_validates_links() {
        let catalog = Arc::new(InMemoryPipelineCatalog::new());
        catalog.insert(PipelineInfo::new("bt1", "Build"));
        let registry = ResourceRegistry::with_catalog(catalog);
        registry.add(resource("1", "db", 5432)).unwrap();

        assert_eq!(
            registry.link_pipeline("1", "bt9"),
            Err(RegistryError::UnknownPipeline("bt9".into()))
        );
        registry.link_pipeline("1", "bt1").unwrap();
        assert_eq!(registry.get_by_id("1").unwrap().pipelines(), ["bt1"]);
    }

    #[test]
    fn test_unregistering_a_pipeline_unlinks_it_everywhere() {
        let registry = ResourceRegistry::new();
        registry.add(resource("1", "db", 5432).with_pipeline("bt1")).unwrap();
        registry.add(resource("2", "cache", 6379).with_pipeline("bt1").with_pipeline("bt2")).unwrap();

        assert_eq!(registry.unregister_pipeline("bt1"), 2);
        assert_eq!(registry.unregister_pipeline("bt1"), 0);
        assert!(registry.find_by_pipeline_id("bt1").is_none());
        assert_eq!(registry.find_by_pipeline_id("bt2").unwrap().id(), "2");
    }

    #[test]
    fn test_replace_all_skips_duplicates_and_reports_changes() {
        let catalog = Arc::new(InMemoryPipelineCatalog::new());
        catalog.insert(PipelineInfo::new("bt1", "Build"));
        let registry = ResourceRegistry::with_catalog(catalog);
        registry.add(resource("1", "db", 5432)).unwrap();
        registry.add(resource("2", "old", 5000)).unwrap();
        let changes = Arc::new(Changes::default());
        registry.add_listener(changes.clone());

        let loaded = registry.replace_all(vec![
            resource("1", "db", 5432).with_pipeline("bt1").with_pipeline("gone"),
            resource("3", "db", 5433),
            resource("4", "cache", 5432),
            resource("5", "cache", 6379),
        ]);

        assert_eq!(loaded, 2);
        assert_eq!(registry.get_by_id("1").unwrap().pipelines(), ["bt1"]);
        assert_eq!(
            *changes.0.lock(),
            vec!["removed:2", "updated:1", "added:5"]
        );
    }

    #[test]
    fn test_persisted_enablement_flag() {
        let registry = ResourceRegistry::new();
        registry.add(resource("1", "db", 5432)).unwrap();
        registry.set_enabled("1", false).unwrap();
        assert!(!registry.get_by_id("1").unwrap().is_enabled());
        assert!(registry.set_enabled("2", false).is_err());
    }
}
