//! Sync Module - the P10 uplink.
//!
//! This module owns everything that happens on the link: the handshake,
//! inbound dispatch, user registration and the channel burst.

pub mod burst;
pub mod context;
pub mod handshake;
pub mod link;
pub mod protocol;
pub mod registrar;
pub mod writer;

pub use burst::{BurstMap, MemberTag};
pub use context::LinkContext;
pub use link::run_link;
pub use protocol::Dispatcher;
pub use registrar::Propagation;
