//! Shared primitives for the CleanPay booking platform.
//!
//! This crate deliberately stays tiny: a money newtype, a secret wrapper, and a
//! couple of parsing helpers that both the engine and the server need.

mod helpers;
mod money;
mod secret;

pub use helpers::parse_boolean_flag;
pub use money::Cents;
pub use secret::Secret;
