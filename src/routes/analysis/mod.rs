mod handler;
mod model;

pub use handler::{analyze_batch, analyze_single};
pub use model::{AnalyzeQuery, BatchAnalysisRequest};
