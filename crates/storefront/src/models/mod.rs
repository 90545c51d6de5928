//! Types carried in HTTP session state.

pub mod session;

pub use session::{IdentityKind, SessionIdentity, keys as session_keys};
