pub mod bench;
pub mod common;
pub mod config;
pub mod decoder;
pub mod executor;
pub mod gas;
pub mod host;
pub mod opcodes;
pub mod revision;
pub mod tracer;
