pub mod deidentify;
pub mod handlers;
pub mod matching;
pub mod middleware;
pub mod routes;

pub use routes::create_router;
