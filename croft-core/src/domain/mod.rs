//! Core domain types
//!
//! This module contains the core domain structures used across Croft services.
//! These types represent the fundamental business entities and are shared between
//! orchestrator (submission and queries) and runner (dispatch and import).

pub mod job;
pub mod log;
pub mod production;
