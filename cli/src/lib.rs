//! Terminal host for the contact vault

pub mod commands;
pub mod error;
pub mod output;
