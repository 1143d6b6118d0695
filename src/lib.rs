//! # vmprov – command-line driver
//!
//! Parses invocation flags, loads the vCenter connection from the
//! environment (optionally seeded from a `.env` file), and turns the
//! core's results into process exit codes.
//!
//! ## Modules
//!
//! - **cli** — `clap` flag surface, run mode selection, exit codes
//! - **config** — Connection settings from env / `.env`
//! - **shutdown** — Ctrl+C / SIGTERM / deadline → cancellation token

pub mod cli;
pub mod config;
pub mod shutdown;
