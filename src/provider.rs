//! Identity-provider metadata consumed by the exchange client and the authorize-URL builder.
//!
//! `descriptor` exposes validated, HTTPS-only endpoints (authorize, token, verify, profile), the
//! issuer allow-list used when checking verified claims, and the requested scope.

pub mod descriptor;

pub use descriptor::*;
