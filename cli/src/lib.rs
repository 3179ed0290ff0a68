//! Debuglet CLI - command-line front end for the debugger agent.

pub mod args;
pub mod platform;
