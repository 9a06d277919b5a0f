//! Daemon side: socket server, gesture pipeline, binding handlers.

mod bindings;
mod pipeline;
mod runtime;
mod server;

pub use runtime::socket_path;
pub use server::{check_report, client_request, run_daemon};
