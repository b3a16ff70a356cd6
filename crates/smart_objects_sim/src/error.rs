//! Simulation-specific failures.

use smart_objects::DefinitionError;

/// Errors raised while building or starting the simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A placement names a definition the world does not declare
    #[error("Collection '{collection}' places unknown definition '{definition}'")]
    UnknownDefinition { collection: String, definition: String },
    /// A world definition failed validation
    #[error("Definition '{name}' is invalid: {source}")]
    InvalidDefinition {
        name: String,
        #[source]
        source: DefinitionError,
    },
    /// The runtime refused a collection
    #[error("Collection '{0}' was refused by the smart object runtime")]
    CollectionRejected(String),
    /// `subsystem.disable_runtime` is set
    #[error("Smart object runtime is disabled by configuration")]
    RuntimeDisabled,
}
