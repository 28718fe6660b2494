//! Agent driver implementations: subprocess, HTTP, and in-process.

pub mod http;
pub mod in_process;
pub mod subprocess;

pub use http::HttpDriver;
pub use in_process::InProcessDriver;
pub use subprocess::{SubprocessConfig, SubprocessDriver};
