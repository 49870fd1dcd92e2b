//! Command-line bot contract.
//!
//! Input front ends turn platform events into [`CommandLine`]s and hand them
//! to a [`CommandCallback`]; output front ends deliver [`Task`]s produced by a
//! backend.

pub mod cmdline;
pub mod error;
pub mod plugin;

pub use {
    cmdline::{CommandLine, Task},
    error::{Error, Result},
    plugin::{CommandCallback, InputFrontend, OutputFrontend},
};
