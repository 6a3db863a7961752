//! Report sink implementations

pub mod fanout;
pub mod filesystem;
pub mod stdout;

pub use fanout::FanoutSink;
pub use filesystem::{FilesystemConfig, FilesystemSink};
pub use stdout::StdoutSink;
