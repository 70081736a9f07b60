//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with external libraries:
//! - `fernet`: Fernet tokens over AES-128-CBC + HMAC-SHA256
//! - `web`: warp routes for the upload page
//! - `sanitize`: PII filtering for logs

pub mod fernet;
pub mod sanitize;
pub mod web;
