//! Bearer-token credential resolution (§4.2) and JWKS-backed JWT validation
//! (§4.8) for the Lore memory service.

mod cache;
mod debounce;
mod jwks;
mod resolver;

pub use jwks::{JwksClient, ValidatedClaims};
pub use resolver::CredentialResolver;
