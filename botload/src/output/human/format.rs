/// Renders milliseconds as a single rounded component in one of: us, ms, s.
pub(crate) fn format_ms(ms: f64) -> String {
    if !ms.is_finite() || ms <= 0.0 {
        return "0ms".to_string();
    }
    if ms >= 1000.0 {
        return format!("{:.2}s", ms / 1000.0);
    }
    if ms >= 1.0 {
        return format!("{ms:.2}ms");
    }
    format!("{:.0}us", ms * 1000.0)
}

pub(crate) fn format_rate(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.1}")
    } else {
        "0".to_string()
    }
}
