//! Request signing
//!
//! The collector never handles credential flows itself. Every outgoing
//! request passes through a [`RequestSigner`], an opaque capability that
//! attaches whatever the remote expects (a bearer token, an OAuth signature
//! computed elsewhere, nothing at all).

mod signer;

pub use signer::{BearerToken, NoAuth, RequestSigner, SharedSigner};
