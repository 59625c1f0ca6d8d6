//! Common traits and helpers shared by the server, the binary and tests

pub mod test_utils;
pub mod traits;

pub use test_utils::spawn_test_server;
pub use traits::EchoServerTrait;
