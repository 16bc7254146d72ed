mod handler;
mod model;

pub use handler::{health, metrics};
pub use model::HealthResponse;
