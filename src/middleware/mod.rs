//! Middleware functions applied to requests before handlers.

pub mod auth;
