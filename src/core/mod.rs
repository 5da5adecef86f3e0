//! Core library components.
//!
//! Everything the CLI drives lives here: configuration, the envelope codec,
//! key providers, object stores and the encrypt-and-replace pipeline.

pub mod config;
pub mod constants;
pub mod envelope;
pub mod event;
pub mod kms;
pub mod object;
pub mod pipeline;
pub mod store;
