//! Command plumbing shared by every handler

pub mod command_helpers;
pub mod health;
pub mod logging;
