pub mod common;
pub mod configs;
pub mod extractor;
pub mod relay;
pub mod server;
pub mod transport;
