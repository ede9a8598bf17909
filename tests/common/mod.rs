//! Integration test common infrastructure.
//!
//! Provides a fake P10 hub and a way to spawn the services binary against it.

pub mod hub;
pub mod services;

#[allow(unused_imports)]
pub use hub::{FakeHub, HubLink};
#[allow(unused_imports)]
pub use services::TestServices;
