mod command;
mod runner;

pub use command::{Command, Report};
pub use runner::{OutputMode, run, run_seeded};
