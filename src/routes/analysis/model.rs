use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct AnalyzeQuery {
    pub domain: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchAnalysisRequest {
    pub domains: Vec<String>,
}
