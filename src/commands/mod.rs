//! Tauri command handlers
//!
//! Each command runs against the [`Workbench`](crate::workbench::Workbench)
//! held in Tauri managed state and reports errors as strings.

pub mod analysis;
pub mod config;
pub mod session;
