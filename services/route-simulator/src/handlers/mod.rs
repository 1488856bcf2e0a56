//! HTTP handlers for the simulator endpoints.

pub mod health;
pub mod info;
pub mod route;
