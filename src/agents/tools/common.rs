use serde_json::Value;

/// Read a required string parameter.
pub fn read_string_param(params: &Value, key: &str) -> Result<String, String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| format!("Missing required parameter: {}", key))
}

/// Read an optional string parameter.
pub fn read_optional_string_param(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Read an optional integer parameter, rejecting values of the wrong type.
///
/// Integral strings and whole floats (`"3"`, `3.0`) are accepted since models
/// emit both.
pub fn read_optional_integer_param(params: &Value, key: &str) -> Result<Option<i64>, String> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => Ok(Some(i)),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| Some(f as i64))
                .ok_or_else(|| format!("Parameter {} must be an integer, got {}", key, n)),
        },
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| format!("Parameter {} must be an integer, got {:?}", key, s)),
        Some(other) => Err(format!("Parameter {} must be an integer, got {}", key, other)),
    }
}

/// Read an optional number parameter, rejecting values of the wrong type.
pub fn read_optional_number_param(params: &Value, key: &str) -> Result<Option<f64>, String> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Some)
            .ok_or_else(|| format!("Parameter {} must be a number, got {:?}", key, s)),
        Some(other) => Err(format!("Parameter {} must be a number, got {}", key, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_param_accepts_common_encodings() {
        let params = json!({"a": 3, "b": "4", "c": 5.0, "d": 2.5, "e": true, "f": null});
        assert_eq!(read_optional_integer_param(&params, "a"), Ok(Some(3)));
        assert_eq!(read_optional_integer_param(&params, "b"), Ok(Some(4)));
        assert_eq!(read_optional_integer_param(&params, "c"), Ok(Some(5)));
        assert!(read_optional_integer_param(&params, "d").is_err());
        assert!(read_optional_integer_param(&params, "e").is_err());
        assert_eq!(read_optional_integer_param(&params, "f"), Ok(None));
        assert_eq!(read_optional_integer_param(&params, "missing"), Ok(None));
    }

    #[test]
    fn string_params() {
        let params = json!({"query": "  spa  ", "city": ""});
        assert_eq!(read_string_param(&params, "query").unwrap(), "spa");
        assert_eq!(read_optional_string_param(&params, "city"), None);
        assert_eq!(
            read_string_param(&params, "other").unwrap_err(),
            "Missing required parameter: other"
        );
    }

    #[test]
    fn number_param() {
        let params = json!({"p": 120.5, "q": "99", "r": [1]});
        assert_eq!(read_optional_number_param(&params, "p"), Ok(Some(120.5)));
        assert_eq!(read_optional_number_param(&params, "q"), Ok(Some(99.0)));
        assert!(read_optional_number_param(&params, "r").is_err());
    }
}
