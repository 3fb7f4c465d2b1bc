//! Shared configuration library for the Lumio playback engine.
//!
//! This crate centralizes config loading/validation for the engine's
//! tuning surfaces (gating policy, autosave cadence, store endpoint,
//! player polling) plus tracing initialization, so embedding hosts and
//! tests share a single source of truth for defaults and validation rules.

pub mod error;
pub mod logging;
pub mod models;

pub use error::ConfigError;
pub use logging::init_tracing;
pub use models::{
    AutosaveConfig, EngineConfig, EngineConfigSource, PlayerConfig,
    PolicyConfig, StoreConfig,
};
