//! HTTP control surface and depot protocol

pub mod depot;
pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, run, AppContext};
