mod handlers;
mod server;

pub use server::{router, HttpServer, HttpServerBuilder, ServerState};
