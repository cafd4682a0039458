//! Command-line interface of the `profsym` binary

pub mod args;

pub use args::{parse_address, Args, Command};
