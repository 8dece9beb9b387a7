// ============================================================================
// family_tasks_es - Event Sourcing Engine for the Family Task Backend
// ============================================================================
//
// - event_sourcing: generic engine (events, store, replay, rehydration)
// - domain:         User, Family and Task aggregates
// - messaging:      Redpanda event bus
// - admin:          replay / rehydration HTTP endpoints
//
// ============================================================================

pub mod admin;
pub mod config;
pub mod domain;
pub mod event_sourcing;
pub mod messaging;
pub mod metrics;
pub mod utils;
