//! API route modules.

pub mod meeting;
