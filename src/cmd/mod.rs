//! CLI command implementations.
//!
//! | Module    | Commands handled |
//! |-----------|------------------|
//! | `project` | `Init`, `Check`  |
//! | `run`     | `Run`            |
//! | `config`  | `Config`         |

pub mod config;
pub mod project;
pub mod run;

pub use config::cmd_config;
pub use project::{cmd_check, cmd_init};
pub use run::cmd_run;
