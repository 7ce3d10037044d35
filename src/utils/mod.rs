//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `skullsup` application.
//!
//! It centralizes the top-level error type and the logging bootstrap so the
//! binary and the tests configure them the same way.

pub mod error;
pub mod logging;
