//! Core types, config, errors, and the request result store for Rusty Eats.

pub mod config;
pub mod error;
pub mod protocol;
pub mod results;
