//! Pre- and post-build step hooks for CI jobs.
//!
//! A [`hook::BuildHook`] wraps a job's main build with two ordered
//! [`step::StepList`]s. The pre list must complete before the main build
//! starts; the post list runs afterwards if the build's outcome meets the
//! configured [`policy::ResultThreshold`].

pub mod config;
pub mod environment;
pub mod errors;
pub mod hook;
pub mod init;
pub mod outcome;
pub mod policy;
pub mod runner;
pub mod session;
pub mod step;
pub mod ui;

pub use errors::{ConfigError, HookError, StepError};
pub use hook::{ActiveHook, BuildHook, HookState, PostStatus};
pub use outcome::BuildOutcome;
pub use policy::{ResultThreshold, should_run_post_steps};
pub use session::{BuildReport, BuildSession, CommandBuild, MainBuild};
