//! Well-known header names.
//!
//! Lookups in [`crate::Headers`] are case-insensitive, so the spelling here only
//! matters for headers the pipeline inserts itself.

pub const ACCEPT: &str = "Accept";
pub const ACCEPT_LANGUAGE: &str = "Accept-Language";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const LOCATION: &str = "Location";
pub const USER_AGENT: &str = "User-Agent";
pub const X_REQUESTED_WITH: &str = "X-Requested-With";
