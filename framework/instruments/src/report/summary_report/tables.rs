use tabled::Tabled;

#[derive(Tabled)]
pub struct OperationRow {
    pub operation_id: String,
    pub total_operations: usize,
    pub errors: usize,
    #[tabled(display = "float2")]
    pub avg_time_ms: f64,
    #[tabled(display = "float2")]
    pub min_time_ms: f64,
    #[tabled(display = "float2")]
    pub p90_time_ms: f64,
    #[tabled(display = "float2")]
    pub p95_time_ms: f64,
    #[tabled(display = "float2")]
    pub max_time_ms: f64,
}

#[derive(Tabled)]
pub struct CheckRow {
    #[tabled(rename = "")]
    pub mark: String,
    #[tabled(rename = "Check")]
    pub name: String,
    #[tabled(rename = "Passes")]
    pub passes: u64,
    #[tabled(rename = "Fails")]
    pub fails: u64,
    #[tabled(rename = "Pass %", display = "float2")]
    pub pass_rate: f64,
}

#[derive(Tabled)]
pub struct MetricRow {
    #[tabled(rename = "#")]
    pub index: usize,
    #[tabled(rename = "Metric")]
    pub name: String,
    #[tabled(rename = "Time")]
    pub timestamp: String,
    #[tabled(rename = "Fields")]
    pub fields: String,
    #[tabled(rename = "Tags")]
    pub tags: String,
}

fn float2(n: &f64) -> String {
    format!("{n:.2}")
}
