//! Foundation module - Core utilities and types
//!
//! - Math types and projection builders
//! - Arena handle types
//! - Logging utilities

pub mod collections;
pub mod logging;
pub mod math;
