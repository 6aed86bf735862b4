// Library target shared by the terminal driver, integration tests and
// criterion benchmarks.

pub mod config;
pub mod engine;
pub mod session;
pub mod store;
