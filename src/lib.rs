// Library crate exposing the store, detector and parsers; the `cellar`
// binary in main.rs wraps them in a CLI.

pub mod bench;
pub mod common;
pub mod config;
pub mod detect;
pub mod errors;
pub mod extract;
pub mod history;
