use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": {
            "oracle": {
                "type": "object",
                "properties": {
                    "provider": { "type": "string" },
                    "model": { "type": "string" },
                    "base_url": { "type": "string" },
                    "api_key_env": { "type": "string" },
                    "max_tokens": { "type": "integer", "minimum": 1 }
                }
            },
            "cache": {
                "type": "object",
                "properties": {
                    "capacity": { "type": "integer", "minimum": 1 }
                }
            },
            "retry": {
                "type": "object",
                "properties": {
                    "policy": { "type": "string", "enum": ["intelligent", "aggressive", "conservative"] },
                    "max_attempts": { "type": "integer", "minimum": 0 },
                    "empty_response_attempts": { "type": "integer", "minimum": 0 }
                }
            },
            "transport": {
                "type": "object",
                "properties": {
                    "max_retries": { "type": "integer", "minimum": 0 }
                }
            },
            "run": {
                "type": "object",
                "properties": {
                    "workers": { "type": "integer", "minimum": 1 }
                }
            }
        }
    })
});

pub static FLOWS_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    let line_ref = json!({
        "oneOf": [
            { "type": "integer" },
            { "type": "array", "items": { "type": "integer" } }
        ]
    });

    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "array",
        "items": {
            "type": "object",
            "required": ["vd", "chains"],
            "properties": {
                "vd": {
                    "type": "object",
                    "required": ["file", "line", "sink"],
                    "properties": {
                        "file": { "type": "string" },
                        "line": line_ref,
                        "sink": { "type": "string" },
                        "param_index": { "type": "integer", "minimum": 0 },
                        "param_indices": { "type": "array", "items": { "type": "integer", "minimum": 0 } }
                    }
                },
                "chains": {
                    "type": "object",
                    "required": ["function_chain"],
                    "properties": {
                        "function_chain": {
                            "type": "array",
                            "items": { "type": "string" },
                            "minItems": 1
                        },
                        "function_call_line": { "type": "array", "items": line_ref }
                    }
                }
            }
        }
    })
});
