//! Croft Core
//!
//! Core types and abstractions for the Croft job pipeline.
//!
//! This crate contains:
//! - Domain types: Core business entities (Job, ProductionEvent, LogEntry)
//! - DTOs: Data transfer objects for the submission and status contracts
//! - Import: Payload parsing and the production record validator

pub mod domain;
pub mod dto;
pub mod import;
pub mod validation;
