//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the application and the cipher library.

mod cipher;

pub use cipher::DocumentCipher;
