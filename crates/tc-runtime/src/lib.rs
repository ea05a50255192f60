#[macro_use]
mod log_macros;

pub mod capture;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod source;
pub mod storage;
pub mod tracing_init;
pub mod writer;
