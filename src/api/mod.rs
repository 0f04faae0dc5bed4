pub mod handlers;
pub mod metrics;
pub mod server;

pub use handlers::ExporterState;
pub use server::{build_router, run_api_mode};
