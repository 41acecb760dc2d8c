//! Caller-supplied request relayed to the upstream API.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Header name to value. Keys are kept exactly as the caller supplied them.
pub type Headers = BTreeMap<String, String>;

/// The two verbs the relay forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

impl FromStr for Method {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            other => Err(anyhow!("Unsupported method '{}': expected GET or POST", other)),
        }
    }
}

/// A single relayed call.
///
/// Owned by the call that builds it. The credential injector mutates
/// `headers` once, and any retry reuses the request as-is.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutboundRequest {
    #[serde(default)]
    pub method: Method,
    pub path: String,
    #[serde(default, deserialize_with = "deserialize_params")]
    pub params: Vec<(String, String)>,
    #[serde(default)]
    pub headers: Option<Headers>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl OutboundRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
            ..Default::default()
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Headers::new)
            .insert(name.into(), value.into());
        self
    }
}

/// Parses a `key=value` pair as given on the command line.
pub fn parse_key_value(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid pair '{}': expected KEY=VALUE", s))?;
    if key.is_empty() {
        return Err(anyhow!("Invalid pair '{}': key is empty", s));
    }
    Ok((key.to_string(), value.to_string()))
}

// Params arrive either as an object or as a list of [key, value] pairs.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawParams {
    Pairs(Vec<(String, Value)>),
    Map(serde_json::Map<String, Value>),
}

fn deserialize_params<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawParams>::deserialize(deserializer)?;
    let pairs = match raw {
        None => Vec::new(),
        Some(RawParams::Pairs(pairs)) => pairs,
        Some(RawParams::Map(map)) => map.into_iter().collect(),
    };
    Ok(pairs
        .into_iter()
        .map(|(k, v)| (k, param_value_to_string(v)))
        .collect())
}

fn param_value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_from_str() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("POST".parse::<Method>().unwrap(), Method::Post);
        assert!("DELETE".parse::<Method>().is_err());
    }

    #[test]
    fn test_deserialize_minimal_request() {
        let req: OutboundRequest = serde_json::from_value(json!({"path": "/v1/models"})).unwrap();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.path, "/v1/models");
        assert!(req.params.is_empty());
        assert!(req.headers.is_none());
        assert!(req.body.is_none());
    }

    #[test]
    fn test_deserialize_params_as_object() {
        let req: OutboundRequest = serde_json::from_value(json!({
            "path": "/v1/files",
            "params": {"limit": 10, "purpose": "fine-tune"}
        }))
        .unwrap();
        assert!(req.params.contains(&("limit".to_string(), "10".to_string())));
        assert!(req.params.contains(&("purpose".to_string(), "fine-tune".to_string())));
    }

    #[test]
    fn test_deserialize_params_as_object_keeps_order() {
        let req: OutboundRequest = serde_json::from_value(serde_json::from_str::<Value>(
            r#"{"path": "/v1/files", "params": {"zeta": "1", "alpha": "2", "mid": 3}}"#,
        )
        .unwrap())
        .unwrap();
        assert_eq!(
            req.params,
            vec![
                ("zeta".to_string(), "1".to_string()),
                ("alpha".to_string(), "2".to_string()),
                ("mid".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_deserialize_params_as_pairs_keeps_order() {
        let req: OutboundRequest = serde_json::from_value(json!({
            "path": "/v1/files",
            "params": [["b", "2"], ["a", "1"], ["b", "3"]]
        }))
        .unwrap();
        assert_eq!(
            req.params,
            vec![
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_deserialize_post_with_headers_and_body() {
        let req: OutboundRequest = serde_json::from_value(json!({
            "method": "POST",
            "path": "/v1/chat/completions",
            "headers": {"X-Trace": "abc"},
            "body": {"model": "gpt-4o"}
        }))
        .unwrap();
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.headers.unwrap().get("X-Trace").unwrap(), "abc");
        assert_eq!(req.body.unwrap(), json!({"model": "gpt-4o"}));
    }

    #[test]
    fn test_builder_helpers() {
        let req = OutboundRequest::get("/v1/models")
            .with_param("limit", "5")
            .with_header("Accept", "application/json");
        assert_eq!(req.params, vec![("limit".to_string(), "5".to_string())]);
        assert_eq!(req.headers.unwrap().get("Accept").unwrap(), "application/json");
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("model=whisper-1").unwrap(),
            ("model".to_string(), "whisper-1".to_string())
        );
        assert_eq!(
            parse_key_value("q=a=b").unwrap(),
            ("q".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }
}
