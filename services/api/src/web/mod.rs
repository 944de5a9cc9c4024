pub mod middleware;
pub mod recompute_task;
pub mod rest;
pub mod routes;
pub mod state;

// Re-export the router builder to make it easily accessible
// to the binary that will build the web server.
pub use middleware::require_user;
pub use rest::{
    get_streak_handler, record_reading_event_handler, recompute_daily_summary_handler,
    run_batch_handler,
};
pub use routes::build_router;
