//! Schema upgrade engine
//!
//! Brings the store's schema from whatever version it currently holds up
//! to the latest version in the registry, applying each step exactly once,
//! atomically with its version bump.

pub mod registry;
pub mod runner;
pub mod step;
pub mod steps;
pub mod version;
