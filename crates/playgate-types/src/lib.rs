//! Shared data model for playgate.
//!
//! `models` holds the domain records every crate agrees on; `api` holds the
//! HTTP request/response shapes and the JWT claims.

pub mod api;
pub mod models;
