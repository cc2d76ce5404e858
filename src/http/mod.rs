//! HTTP surface: router, authentication, error mapping

pub mod middleware;
pub mod routes;

pub use routes::build_router;
