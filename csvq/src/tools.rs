//! Tool surface shared by the JSON-RPC dispatcher and the HTTP routes.

use csvq_result::Error;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::gateway::Gateway;

pub const DESCRIBE_CSV: &str = "describe_csv";
pub const EXECUTE_QUERIES: &str = "execute_queries";
pub const EXECUTE_QUERY: &str = "execute_query";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DescribeArgs {
    pub filepath: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecuteQueriesArgs {
    pub filepath: String,
    pub queries: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecuteQueryArgs {
    pub filepath: String,
    pub query: String,
}

/// A parsed `tools/call` request.
#[derive(Debug, Clone)]
pub enum ToolCall {
    DescribeCsv(DescribeArgs),
    ExecuteQueries(ExecuteQueriesArgs),
    ExecuteQuery(ExecuteQueryArgs),
}

impl ToolCall {
    /// Match `name` to a tool and decode its arguments. The error is a human-readable reason.
    pub fn parse(name: &str, arguments: Value) -> Result<Self, String> {
        let arguments = if arguments.is_null() {
            Value::Object(Default::default())
        } else {
            arguments
        };
        let decode_error = |err: serde_json::Error| format!("invalid arguments for {name}: {err}");
        match name {
            DESCRIBE_CSV => serde_json::from_value(arguments)
                .map(ToolCall::DescribeCsv)
                .map_err(decode_error),
            EXECUTE_QUERIES => serde_json::from_value(arguments)
                .map(ToolCall::ExecuteQueries)
                .map_err(decode_error),
            EXECUTE_QUERY => serde_json::from_value(arguments)
                .map(ToolCall::ExecuteQuery)
                .map_err(decode_error),
            other => Err(format!("unknown tool '{other}'")),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::DescribeCsv(_) => DESCRIBE_CSV,
            ToolCall::ExecuteQueries(_) => EXECUTE_QUERIES,
            ToolCall::ExecuteQuery(_) => EXECUTE_QUERY,
        }
    }

    /// Run the call and render its output as JSON.
    pub async fn invoke(self, gateway: &Gateway) -> csvq_result::Result<Value> {
        let value = match self {
            ToolCall::DescribeCsv(args) => {
                let description = gateway.describe(&args.filepath).await?;
                serde_json::to_value(description)
            }
            ToolCall::ExecuteQueries(args) => {
                let payloads = gateway
                    .execute_many(&args.filepath, args.queries.as_slice())
                    .await?;
                serde_json::to_value(payloads)
            }
            ToolCall::ExecuteQuery(args) => {
                let payload = gateway.execute_one(&args.filepath, &args.query).await?;
                serde_json::to_value(payload)
            }
        };
        value.map_err(Error::query_semantic)
    }
}

/// Tool listing returned by `tools/list`.
pub fn tool_definitions() -> Value {
    let filepath = json!({
        "type": "string",
        "description": "Path to the CSV file. Absolute on stdio; may be relative to the files directory when served over HTTP."
    });
    json!([
        {
            "name": DESCRIBE_CSV,
            "description": "Return the shape and column data types of a CSV file.",
            "inputSchema": {
                "type": "object",
                "properties": { "filepath": filepath },
                "required": ["filepath"]
            }
        },
        {
            "name": EXECUTE_QUERIES,
            "description": "Run several SQL queries against a CSV file and return one result per query, in order. The file is available as the table `self`.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "filepath": filepath,
                    "queries": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["filepath", "queries"]
            }
        },
        {
            "name": EXECUTE_QUERY,
            "description": "Run one SQL query against a CSV file. The file is available as the table `self`.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "filepath": filepath,
                    "query": { "type": "string" }
                },
                "required": ["filepath", "query"]
            }
        }
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_routes_by_name() {
        let call = ToolCall::parse(
            EXECUTE_QUERIES,
            json!({"filepath": "/t.csv", "queries": ["SELECT 1"]}),
        )
        .expect("parse");
        assert_eq!(call.name(), EXECUTE_QUERIES);
        let ToolCall::ExecuteQueries(args) = call else {
            panic!("wrong variant");
        };
        assert_eq!(args.queries, vec!["SELECT 1".to_string()]);
    }

    #[test]
    fn parse_rejects_unknown_tools_and_bad_arguments() {
        assert!(ToolCall::parse("drop_table", json!({})).is_err());
        assert!(ToolCall::parse(EXECUTE_QUERY, json!({"filepath": "/t.csv"})).is_err());
        assert!(ToolCall::parse(DESCRIBE_CSV, Value::Null).is_err());
        assert!(ToolCall::parse(DESCRIBE_CSV, json!({"filepath": 3})).is_err());
    }

    #[test]
    fn every_tool_is_listed() {
        let listed: Vec<String> = tool_definitions()
            .as_array()
            .expect("array")
            .iter()
            .map(|tool| tool["name"].as_str().expect("name").to_string())
            .collect();
        assert_eq!(listed, vec![DESCRIBE_CSV, EXECUTE_QUERIES, EXECUTE_QUERY]);
    }
}
