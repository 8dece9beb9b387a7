// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// This module contains domain-specific aggregates and business logic.
// Each aggregate has its own subdirectory with:
// - Value objects
// - Events
// - Commands
// - Errors
// - Aggregate implementation
//
// Each domain exposes `registry()`, the immutable tag table its event store
// decodes with. Nothing here touches storage directly.
//
// ============================================================================

use std::sync::Arc;

use crate::event_sourcing::core::{EventDecoder, EventTypeRegistry};

pub mod family;
pub mod task;
pub mod user;

/// Registries for every aggregate type in the system.
pub fn registries() -> Vec<Arc<dyn EventTypeRegistry>> {
    vec![
        Arc::new(user::registry()),
        Arc::new(family::registry()),
        Arc::new(task::registry()),
    ]
}

/// Decoder for a store shared by all aggregate types.
pub fn decoder() -> EventDecoder {
    EventDecoder::composite(registries())
}
