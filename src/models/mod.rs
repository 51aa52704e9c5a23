//! Data models for the portal backend.

mod member;

pub use member::*;
