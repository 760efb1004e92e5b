//! Shared pieces of the `fpstore` binary

pub mod input;
pub mod output;
