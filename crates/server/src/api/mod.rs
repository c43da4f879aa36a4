pub mod handlers;
pub mod ingest;
pub mod middleware;
pub mod routes;
pub mod scheduler;

pub use routes::create_router;
