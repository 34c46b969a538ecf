//! Data Transfer Objects for inter-service communication
//!
//! This module contains DTOs exchanged between the orchestrator API and its
//! clients (CLI, other services).

pub mod job;
