//! HTTP handlers.

pub mod auth;
pub mod extract;
pub mod password;
pub mod register;
