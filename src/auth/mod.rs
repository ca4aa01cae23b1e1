//! Identity provider boundary.
//!
//! Tokens are issued elsewhere; this service only validates them and trusts
//! the `sub` claim as the opaque principal id attached to every call.

pub mod jwt;
pub mod middleware;
pub mod model;

pub use jwt::*;
pub use middleware::*;
pub use model::*;
