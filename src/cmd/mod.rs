//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled            |
//! |-----------|-----------------------------|
//! | `project` | `Init`, `Reset`             |
//! | `status`  | `Status`, `Watch`           |
//! | `run`     | bare invocation (controller)|

pub mod project;
pub mod run;
pub mod status;

pub use project::{cmd_init, cmd_reset};
pub use run::run_controller;
pub use status::{cmd_status, cmd_watch};
