//! # Collections
//!
//! Persisted batches of smart object placements. A
//! [`SmartObjectContainer`] holds entries (handle, transform, bounds,
//! definition index, tags) and the deduplicated definitions they refer to.
//! The subsystem keeps one main container into which registered
//! [`PersistentCollection`]s are appended, and sizes its spatial index from
//! the main container's bounds.
//!
//! ## Append / Remove
//!
//! `append` copies entries and remaps their definition indices.
//! `remove` undoes an append: when the other container's entries form one
//! contiguous run in this container (the usual case for a previously
//! appended block) the run is erased in one step, otherwise entries are
//! removed by handle. Unused definitions are compacted away and the bounds
//! are recomputed only when something was removed.

use crate::component::SmartObjectComponent;
use crate::definition::SmartObjectDefinition;
use crate::error::DefinitionError;
use crate::math::{Box3, Transform};
use crate::tags::TagContainer;
use crate::types::{ComponentId, ObjectHandle};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// One placement in a container.
#[derive(Debug, Clone)]
pub struct CollectionEntry {
    pub handle: ObjectHandle,
    pub transform: Transform,
    pub bounds: Box3,
    /// Index into the container's definitions
    pub definition_index: usize,
    pub tags: TagContainer,
    /// Component the entry was created from, if any
    pub component: Option<ComponentId>,
}

/// Entries plus the definitions they reference.
#[derive(Clone, Default)]
pub struct SmartObjectContainer {
    entries: Vec<CollectionEntry>,
    definitions: Vec<Arc<SmartObjectDefinition>>,
    bounds: Box3,
}

impl fmt::Debug for SmartObjectContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartObjectContainer")
            .field("entries", &self.entries.len())
            .field("definitions", &self.definitions.len())
            .field("bounds", &self.bounds)
            .finish()
    }
}

impl SmartObjectContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[CollectionEntry] {
        &self.entries
    }

    pub fn definitions(&self) -> &[Arc<SmartObjectDefinition>] {
        &self.definitions
    }

    /// Union of every entry's bounds.
    pub fn bounds(&self) -> Box3 {
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.entries.iter().any(|entry| entry.handle == handle)
    }

    pub fn entry(&self, handle: ObjectHandle) -> Option<&CollectionEntry> {
        self.entries.iter().find(|entry| entry.handle == handle)
    }

    pub fn definition_for_entry(&self, entry: &CollectionEntry) -> Option<&Arc<SmartObjectDefinition>> {
        self.definitions.get(entry.definition_index)
    }

    /// Index of `definition`, adding it if it is not referenced yet.
    fn definition_index(&mut self, definition: &Arc<SmartObjectDefinition>) -> usize {
        match self.definitions.iter().position(|d| Arc::ptr_eq(d, definition)) {
            Some(index) => index,
            None => {
                self.definitions.push(definition.clone());
                self.definitions.len() - 1
            }
        }
    }

    /// Adds a placement for `definition`.
    ///
    /// Returns false if an entry with `handle` already exists.
    pub fn add_entry(
        &mut self,
        handle: ObjectHandle,
        definition: &Arc<SmartObjectDefinition>,
        transform: Transform,
        tags: TagContainer,
        component: Option<ComponentId>,
    ) -> bool {
        if self.contains(handle) {
            return false;
        }
        let definition_index = self.definition_index(definition);
        let bounds = definition.world_bounds(&transform);
        self.entries.push(CollectionEntry {
            handle,
            transform,
            bounds,
            definition_index,
            tags,
            component,
        });
        self.bounds = self.bounds.union(&bounds);
        true
    }

    /// Finds or creates the entry for `component`.
    ///
    /// # Returns
    ///
    /// The entry and whether it was already present, or `None` when the
    /// component has no definition.
    pub fn add_smart_object(&mut self, component: &SmartObjectComponent) -> Option<(CollectionEntry, bool)> {
        let handle = component.handle();
        if let Some(existing) = self.entry(handle) {
            return Some((existing.clone(), true));
        }

        let definition = component.definition.as_ref()?;
        self.add_entry(
            handle,
            definition,
            component.transform,
            component.tags.clone(),
            Some(component.id),
        );
        self.entries.last().cloned().map(|entry| (entry, false))
    }

    /// Removes the entry created for `component`.
    pub fn remove_smart_object(&mut self, component: ComponentId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.component != Some(component));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.compact_definitions();
            self.recompute_bounds();
        }
        removed > 0
    }

    /// Merges `other` into this container.
    pub fn append(&mut self, other: &SmartObjectContainer) {
        let remap: Vec<usize> = other
            .definitions
            .iter()
            .map(|definition| self.definition_index(definition))
            .collect();

        self.entries.reserve(other.entries.len());
        for entry in &other.entries {
            let mut entry = entry.clone();
            entry.definition_index = remap[entry.definition_index];
            self.entries.push(entry);
        }
        self.bounds = self.bounds.union(&other.bounds);
    }

    /// Removes every entry of `other` from this container.
    ///
    /// # Returns
    ///
    /// Number of entries removed.
    pub fn remove(&mut self, other: &SmartObjectContainer) -> usize {
        if other.entries.is_empty() || self.entries.is_empty() {
            return 0;
        }

        let removed = match self.find_contiguous_run(other) {
            Some(start) => {
                self.entries.drain(start..start + other.entries.len());
                other.entries.len()
            }
            None => {
                let handles: HashSet<ObjectHandle> = other.entries.iter().map(|entry| entry.handle).collect();
                let before = self.entries.len();
                self.entries.retain(|entry| !handles.contains(&entry.handle));
                before - self.entries.len()
            }
        };

        if removed > 0 {
            self.compact_definitions();
            self.recompute_bounds();
        }
        debug!("Removed {} entries from container ({} left)", removed, self.entries.len());
        removed
    }

    /// Start index of `other`'s entries if they appear in the same order
    /// without gaps.
    fn find_contiguous_run(&self, other: &SmartObjectContainer) -> Option<usize> {
        let first = other.entries.first()?.handle;
        let start = self.entries.iter().position(|entry| entry.handle == first)?;
        let end = start + other.entries.len();
        if end > self.entries.len() {
            return None;
        }
        self.entries[start..end]
            .iter()
            .zip(&other.entries)
            .all(|(mine, theirs)| mine.handle == theirs.handle)
            .then_some(start)
    }

    fn compact_definitions(&mut self) {
        let mut used = vec![false; self.definitions.len()];
        for entry in &self.entries {
            if let Some(flag) = used.get_mut(entry.definition_index) {
                *flag = true;
            }
        }
        if used.iter().all(|u| *u) {
            return;
        }

        let mut remap = vec![usize::MAX; self.definitions.len()];
        let mut kept = Vec::with_capacity(self.definitions.len());
        for (index, definition) in self.definitions.drain(..).enumerate() {
            if used[index] {
                remap[index] = kept.len();
                kept.push(definition);
            }
        }
        self.definitions = kept;
        for entry in &mut self.entries {
            entry.definition_index = remap[entry.definition_index];
        }
    }

    fn recompute_bounds(&mut self) {
        self.bounds = self
            .entries
            .iter()
            .fold(Box3::empty(), |bounds, entry| bounds.union(&entry.bounds));
    }

    /// Validation result for each definition, by definition index.
    pub fn validate_definitions(&self) -> Vec<Result<(), DefinitionError>> {
        self.definitions.iter().map(|definition| definition.validate()).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.definitions.clear();
        self.bounds = Box3::empty();
    }
}

// ============================================================================
// Persistent collections
// ============================================================================

/// Identifier of a [`PersistentCollection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollectionId(pub Uuid);

impl CollectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CollectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// A named, persisted batch of placements.
#[derive(Debug, Clone)]
pub struct PersistentCollection {
    pub id: CollectionId,
    pub name: String,
    pub container: SmartObjectContainer,
}

impl PersistentCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CollectionId::new(),
            name: name.into(),
            container: SmartObjectContainer::new(),
        }
    }

    /// Set id and every entry referencing an existing definition.
    pub fn is_valid(&self) -> bool {
        !self.id.0.is_nil()
            && self
                .container
                .entries()
                .iter()
                .all(|entry| entry.definition_index < self.container.definitions().len())
    }
}

/// Outcome of [`register_collection`](crate::SmartObjectSubsystem::register_collection).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionRegistrationResult {
    FailedInvalidCollection,
    FailedAlreadyRegistered,
    Succeeded,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::SlotDefinition;
    use crate::math::Vec3;

    fn definition(name: &str) -> Arc<SmartObjectDefinition> {
        Arc::new(SmartObjectDefinition::new(name, vec![SlotDefinition::default()]))
    }

    fn container(definition: &Arc<SmartObjectDefinition>, xs: &[f64]) -> SmartObjectContainer {
        let mut container = SmartObjectContainer::new();
        for x in xs {
            container.add_entry(
                ObjectHandle::dynamic(),
                definition,
                Transform::from_location(Vec3::new(*x, 0.0, 0.0)),
                TagContainer::new(),
                None,
            );
        }
        container
    }

    fn handles(container: &SmartObjectContainer) -> Vec<ObjectHandle> {
        container.entries().iter().map(|entry| entry.handle).collect()
    }

    #[test]
    fn append_deduplicates_definitions() {
        let chair = definition("Chair");
        let bench = definition("Bench");
        let mut main = container(&chair, &[0.0]);
        let mut other = container(&bench, &[100.0]);
        other.add_entry(ObjectHandle::dynamic(), &chair, Transform::IDENTITY, TagContainer::new(), None);

        main.append(&other);
        assert_eq!(main.len(), 3);
        assert_eq!(main.definitions().len(), 2);
        for entry in main.entries() {
            let definition = main.definition_for_entry(entry).unwrap();
            let expected = if entry.transform.location.x == 100.0 { "Bench" } else { "Chair" };
            assert_eq!(definition.name, expected);
        }
    }

    #[test]
    fn append_then_remove_restores_original() {
        let chair = definition("Chair");
        let bench = definition("Bench");
        let mut main = container(&chair, &[0.0, 10.0]);
        let original_handles = handles(&main);
        let original_bounds = main.bounds();

        let other = container(&bench, &[5000.0, 6000.0, 7000.0]);
        main.append(&other);
        assert!(main.bounds().max.x > original_bounds.max.x);

        assert_eq!(main.remove(&other), 3);
        assert_eq!(handles(&main), original_handles);
        assert_eq!(main.bounds(), original_bounds);
        assert_eq!(main.definitions().len(), 1);
    }

    #[test]
    fn remove_handles_scattered_entries() {
        let chair = definition("Chair");
        let a = container(&chair, &[0.0, 1.0]);
        let b = container(&chair, &[2.0, 3.0]);
        let mut main = SmartObjectContainer::new();
        main.append(&a);
        main.append(&b);

        // Interleave so `a` is no longer contiguous.
        main.entries.swap(1, 2);
        assert_eq!(main.remove(&a), 2);
        assert_eq!(handles(&main), handles(&b));
    }

    #[test]
    fn remove_without_matches_keeps_bounds() {
        let chair = definition("Chair");
        let mut main = container(&chair, &[0.0]);
        let bounds = main.bounds();
        assert_eq!(main.remove(&container(&chair, &[99.0])), 0);
        assert_eq!(main.bounds(), bounds);
    }

    #[test]
    fn component_entries_are_found_again() {
        let chair = definition("Chair");
        let mut container = SmartObjectContainer::new();
        let component = SmartObjectComponent::new(Uuid::new_v4(), chair, Transform::IDENTITY);

        let (entry, existed) = container.add_smart_object(&component).unwrap();
        assert!(!existed);
        assert_eq!(entry.handle, component.handle());
        let (_, existed) = container.add_smart_object(&component).unwrap();
        assert!(existed);

        assert!(container.remove_smart_object(component.id));
        assert!(container.is_empty());
        assert!(container.definitions().is_empty());
    }
}
