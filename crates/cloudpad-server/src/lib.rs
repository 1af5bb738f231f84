//! Cloudpad server: wires the selected cluster backend to the node grid and
//! exposes both over HTTP.

pub mod backend;
pub mod routes;
pub mod state;

pub use backend::build_cluster;
pub use routes::build_router;
pub use state::AppState;
