// Shared library for the PRTG sensor interval editor

pub mod config;
pub mod editor;
pub mod errors;
pub mod filter;
pub mod inheritance;
pub mod models;
pub mod prtg;
pub mod retry;
pub mod table;
pub mod telemetry;
