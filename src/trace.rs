use serde_json::Value;
use tracing::info;

use crate::config::TraceLevel;

/// Render the interesting parts of a trace payload as readable lines.
///
/// Reasoning and rationale show at every level, invocation input from
/// `Standard`, pre/post-processing from `Detailed`. `Raw` dumps the payload.
pub fn render_trace(payload: &Value, level: TraceLevel) -> Vec<String> {
    let mut lines = Vec::new();
    if !level.enabled() {
        return lines;
    }
    if level == TraceLevel::Raw {
        lines.push(format!("raw trace: {payload}"));
        return lines;
    }

    let trace = payload.get("trace").unwrap_or(payload);

    if let Some(orch) = trace.get("orchestrationTrace") {
        if let Some(text) = orch
            .pointer("/modelInvocationOutput/reasoningContent/reasoningText/text")
            .and_then(Value::as_str)
        {
            lines.push(format!("reasoning: {text}"));
        }
        if let Some(text) = orch.pointer("/rationale/text").and_then(Value::as_str) {
            lines.push(format!("rationale: {text}"));
        }

        if level >= TraceLevel::Standard {
            if let Some(inv) = orch.get("invocationInput") {
                let kind = inv["invocationType"].as_str().unwrap_or("Unknown");
                lines.push(format!("invocation type: {kind}"));
                if let Some(action) = inv.get("actionGroupInvocationInput") {
                    lines.push(format!(
                        "action group: {}, function: {}",
                        action["actionGroupName"].as_str().unwrap_or("Unknown"),
                        action["function"].as_str().unwrap_or("Unknown"),
                    ));
                    for p in action["parameters"].as_array().into_iter().flatten() {
                        lines.push(format!(
                            "  - {}: {} ({})",
                            p["name"].as_str().unwrap_or("?"),
                            p["value"].as_str().unwrap_or(""),
                            p["type"].as_str().unwrap_or("unknown"),
                        ));
                    }
                }
            }
        }
    }

    if level >= TraceLevel::Detailed {
        if let Some(text) = trace
            .pointer("/preProcessingTrace/modelInvocationOutput/parsedResponse/rationale")
            .and_then(Value::as_str)
        {
            lines.push(format!("pre-processing rationale: {text}"));
        }
        if let Some(text) = trace
            .pointer("/postProcessingTrace/modelInvocationOutput/reasoningContent/reasoningText/text")
            .and_then(Value::as_str)
        {
            lines.push(format!("post-processing reasoning: {text}"));
        }
    }

    lines
}

/// Log a trace payload at the configured level and hand back what was logged.
pub fn log_trace(payload: &Value, level: TraceLevel) -> Vec<String> {
    let lines = render_trace(payload, level);
    for line in &lines {
        info!(target: "inline_agent::trace", "{line}");
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "trace": {
                "orchestrationTrace": {
                    "rationale": {"text": "Need the weather"},
                    "invocationInput": {
                        "invocationType": "ACTION_GROUP",
                        "actionGroupInvocationInput": {
                            "actionGroupName": "WeatherActions",
                            "function": "get_weather",
                            "parameters": [{"name": "city", "value": "Oslo", "type": "string"}]
                        }
                    }
                },
                "preProcessingTrace": {
                    "modelInvocationOutput": {"parsedResponse": {"rationale": "Looks valid"}}
                }
            }
        })
    }

    #[test]
    fn none_renders_nothing() {
        assert!(render_trace(&sample(), TraceLevel::None).is_empty());
    }

    #[test]
    fn minimal_shows_rationale_only() {
        assert_eq!(
            render_trace(&sample(), TraceLevel::Minimal),
            vec!["rationale: Need the weather"]
        );
    }

    #[test]
    fn standard_adds_invocation_input() {
        let lines = render_trace(&sample(), TraceLevel::Standard);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "action group: WeatherActions, function: get_weather");
        assert_eq!(lines[3], "  - city: Oslo (string)");
    }

    #[test]
    fn detailed_adds_pre_processing() {
        let lines = render_trace(&sample(), TraceLevel::Detailed);
        assert_eq!(lines.last().unwrap(), "pre-processing rationale: Looks valid");
    }

    #[test]
    fn raw_dumps_payload() {
        let lines = render_trace(&json!({"x": 1}), TraceLevel::Raw);
        assert_eq!(lines, vec![r#"raw trace: {"x":1}"#]);
    }
}
