//! Login-domain identifiers, redacted secrets, and the records the broker persists.

pub mod claim;
pub mod id;
pub mod linkage;
pub mod salt;
pub mod secret;
pub mod state;

pub use claim::*;
pub use id::*;
pub use linkage::*;
pub use salt::*;
pub use secret::*;
pub use state::*;
