use sluice::{TypeContext, Value, value::build};

#[allow(dead_code)]
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

pub fn rec(ctx: &TypeContext, fields: &[(&str, Value)]) -> Value {
    let fields = fields
        .iter()
        .map(|(name, val)| (name.to_string(), val.clone()))
        .collect();
    build::record(ctx, fields).unwrap()
}

/// Renders values, sorted, for order-insensitive comparisons.
#[allow(dead_code)]
pub fn sorted_text(vals: &[Value]) -> Vec<String> {
    let mut out: Vec<String> = vals.iter().map(Value::to_string).collect();
    out.sort();
    out
}

#[allow(dead_code)]
pub fn text(vals: &[Value]) -> Vec<String> {
    vals.iter().map(Value::to_string).collect()
}
