//! Command-line admin console for the hackathon platform backend.
//!
//! [`api::ApiClient`] speaks the admin REST API and feeds the shared
//! list and session controllers; [`commands`] wires them to the terminal.

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
