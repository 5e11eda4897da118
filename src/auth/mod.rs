//! Authentication: session lifecycle and request signing

pub mod session;
pub mod signature;

pub use session::AuthSession;
pub use signature::{RequestSignature, sign};
