//! Waterbird survey service - field data collection for wildlife surveys.
//!
//! # Overview
//!
//! Observers record "Waterbird Foraging" and "Rookery Census" surveys in the
//! field. Each survey carries site conditions plus nested species
//! observations and disturbance events. A survey is created pending, can be
//! flagged finished once editing is done, and is finally marked completed.
//!
//! # Modules
//!
//! - [`model`]: Survey entities and lifecycle variants
//! - [`dto`]: Wire models exchanged with field clients
//! - [`mapper`]: Translation between wire models and entities, date/time parsing
//! - [`storage`]: Store abstraction and SQLite implementation
//! - [`manager`]: Survey lifecycle orchestration
//! - [`api`]: HTTP API handlers and router
//! - [`error`]: Error taxonomy and HTTP mapping
//! - [`config`]: Environment configuration

pub mod api;
pub mod config;
pub mod dto;
pub mod error;
pub mod manager;
pub mod mapper;
pub mod model;
pub mod storage;
