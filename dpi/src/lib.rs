// Library lints
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(unsafe_code)]

pub use parser::process;

pub mod error;
pub mod frame;
pub mod parser;
pub mod protocols;
