//! State management module.
//!
//! Contains the [`StateStore`] (the network mirror) and the records it owns.

mod channel;
mod numeric;
mod store;
mod user;

pub use channel::{Channel, normalize_modes};
pub use numeric::ClientNumerics;
pub use store::{Server, StateStore};
pub use user::{User, UserModes};
