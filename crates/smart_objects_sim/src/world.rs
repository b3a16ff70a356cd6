//! Turns the configured world description into runtime collections.

use crate::config::WorldSettings;
use crate::error::SimError;
use smart_objects::{ObjectHandle, PersistentCollection, Rotator, SmartObjectDefinition, Transform};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Builds one [`PersistentCollection`] per configured collection.
///
/// Definitions are shared between collections so placements of the same
/// kind reference one `Arc`.
pub fn build_collections(world: &WorldSettings) -> Result<Vec<PersistentCollection>, SimError> {
    let mut definitions: HashMap<&str, Arc<SmartObjectDefinition>> = HashMap::new();
    for definition in &world.definitions {
        definition.validate().map_err(|source| SimError::InvalidDefinition {
            name: definition.name.clone(),
            source,
        })?;
        definitions.insert(definition.name.as_str(), Arc::new(definition.clone()));
    }

    let mut collections = Vec::with_capacity(world.collections.len());
    for settings in &world.collections {
        let mut collection = PersistentCollection::new(settings.name.clone());
        for placement in &settings.placements {
            let definition =
                definitions
                    .get(placement.definition.as_str())
                    .ok_or_else(|| SimError::UnknownDefinition {
                        collection: settings.name.clone(),
                        definition: placement.definition.clone(),
                    })?;
            let transform = Transform::new(placement.location, Rotator::from_yaw(placement.yaw));
            collection.container.add_entry(
                ObjectHandle::dynamic(),
                definition,
                transform,
                placement.tags.clone(),
                None,
            );
        }
        debug!(
            "Built collection '{}' with {} placements",
            collection.name,
            collection.container.len()
        );
        collections.push(collection);
    }
    Ok(collections)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_world_shares_definitions() {
        let collections = build_collections(&WorldSettings::default()).unwrap();
        assert_eq!(collections.len(), 2);

        let plaza = &collections[0];
        assert_eq!(plaza.name, "Plaza");
        assert_eq!(plaza.container.len(), 4);
        assert_eq!(plaza.container.definitions().len(), 1);
        assert!(plaza.is_valid());
        assert!(plaza.container.bounds().is_valid());
    }

    #[test]
    fn unknown_definition_is_reported() {
        let mut world = WorldSettings::default();
        world.collections[1].placements[0].definition = "Fountain".to_string();

        match build_collections(&world) {
            Err(SimError::UnknownDefinition { collection, definition }) => {
                assert_eq!(collection, "Market");
                assert_eq!(definition, "Fountain");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn invalid_definition_is_reported() {
        let mut world = WorldSettings::default();
        world.definitions[0].slots.clear();
        assert!(matches!(
            build_collections(&world),
            Err(SimError::InvalidDefinition { .. })
        ));
    }
}
