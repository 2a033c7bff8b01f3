pub mod config;
pub mod preset;
pub mod simulate;
pub mod stats;

/// Result type shared by every command.
pub type CmdResult = Result<(), Box<dyn std::error::Error>>;
