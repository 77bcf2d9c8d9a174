//! Integration tests against a live Redis and the real audio tools.

pub mod media_tests;
pub mod redis_tests;
