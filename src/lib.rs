// Library exports for Heron
// This allows integration tests and external code to use Heron modules

pub mod config;
pub mod error;
pub mod friends;
pub mod posts;
pub mod reactions;
pub mod store;
pub mod sync;
pub mod theme;
pub mod users;
