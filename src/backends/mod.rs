//! Capability implementations.
//!
//! [`sso`] talks to the real role-credential service; [`mock`] provides
//! in-memory stand-ins for every pipeline capability.

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "aws")]
pub mod sso;
