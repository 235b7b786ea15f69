use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("failed to serialize json: {}", e),
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct ErrorOut<'a> {
    pub code: &'a str,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'a str>,
}

pub fn print_json_error(code: &str, message: &str, hint: Option<&str>) {
    let err = ErrorOut { code, message, hint };
    print_json(&err);
}

#[derive(Serialize, Debug, Clone)]
pub struct SegmentPlan {
    pub label: String,
    pub rows: usize,
    pub chunks: usize,
    pub tokens: usize,
}

pub fn render_segment_plan_text(plan: &[SegmentPlan], dropped_rows: usize) {
    if plan.is_empty() {
        println!("no segments");
    }
    for p in plan {
        println!("{:<18} rows={:<6} chunks={:<4} tokens~{}", p.label, p.rows, p.chunks, p.tokens);
    }
    if dropped_rows > 0 {
        println!("dropped rows: {}", dropped_rows);
    }
}
