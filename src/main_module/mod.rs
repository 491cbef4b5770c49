//! HTTP application wiring split from main.rs

mod health;
mod server;
mod shutdown;

pub use health::*;
pub use server::*;
pub use shutdown::*;
