//! Tool definitions for function-calling clients.
//!
//! This module describes each service operation as a JSON-schema tool and
//! dispatches tool calls onto [`H1bService`].

use crate::ask::{DEFAULT_EXPORT_MAX, DEFAULT_SPONSOR_LIMIT};
use crate::error::LcaError;
use crate::models::{Period, SearchFilter};
use crate::service::{error_value, H1bService};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Default export filename.
pub const DEFAULT_EXPORT_FILENAME: &str = "h1b_results.csv";

/// Tool definition in the function-calling format.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A tool call made by a client.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }
}

/// Result of executing a tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: String) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(message),
        }
    }

    fn from_lca(e: &LcaError) -> Self {
        Self {
            success: false,
            output: serde_json::to_string_pretty(&error_value(e)).unwrap_or_default(),
            error: Some(e.to_string()),
        }
    }

    fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string_pretty(value) {
            Ok(output) => Self::success(output),
            Err(e) => Self::error(format!("Failed to serialize result: {}", e)),
        }
    }
}

/// Whether the named tool queries an already loaded table.
pub fn reads_data(name: &str) -> bool {
    matches!(
        name,
        "search_h1b_jobs" | "get_company_stats" | "get_top_sponsors" | "export_results"
    )
}

/// The tools executor that handles tool calls.
pub struct ToolExecutor {
    service: Arc<H1bService>,
}

impl ToolExecutor {
    pub fn new(service: Arc<H1bService>) -> Self {
        Self { service }
    }

    /// Execute a tool call and return the result.
    pub async fn execute(&self, tool_call: &ToolCall) -> ToolResult {
        let name = &tool_call.function.name;
        let args = &tool_call.function.arguments;

        debug!("Executing tool: {} with args: {:?}", name, args);

        match name.as_str() {
            "load_h1b_data" => self.load_h1b_data(args).await,
            "search_h1b_jobs" => self.search_h1b_jobs(args),
            "get_company_stats" => self.get_company_stats(args),
            "get_top_sponsors" => self.get_top_sponsors(args),
            "export_results" => self.export_results(args),
            "get_available_data" => ToolResult::json(&self.service.available_data()),
            "ask" => self.ask(args).await,
            _ => ToolResult::error(format!("Unknown tool: {}", name)),
        }
    }

    async fn load_h1b_data(&self, args: &Value) -> ToolResult {
        let force = bool_arg(args, "force_download", false);
        let defaults = Period::default();
        let parts = int_arg(args, "year").and_then(|y| Ok((y, int_arg(args, "quarter")?)));
        let (year, quarter) = match parts {
            Ok((year, quarter)) => (
                year.unwrap_or(defaults.year as i64),
                quarter.unwrap_or(defaults.quarter as i64),
            ),
            Err(result) => return result,
        };

        let period = match Period::from_parts(year, quarter) {
            Ok(p) => p,
            Err(e) => return ToolResult::from_lca(&e),
        };

        match self.service.load_data(period, force).await {
            Ok(summary) => ToolResult::json(&summary),
            Err(e) => ToolResult::from_lca(&e),
        }
    }

    fn search_h1b_jobs(&self, args: &Value) -> ToolResult {
        let parsed = search_filter(args, 50).and_then(|f| Ok((f, period_arg(args)?)));
        let (filter, period) = match parsed {
            Ok(parsed) => parsed,
            Err(result) => return result,
        };

        match self.service.search_jobs(&filter, period) {
            Ok(outcome) => ToolResult::json(&outcome),
            Err(e) => ToolResult::from_lca(&e),
        }
    }

    fn get_company_stats(&self, args: &Value) -> ToolResult {
        let company = match args.get("company_name").and_then(|v| v.as_str()) {
            Some(c) => c,
            None => {
                return ToolResult::error("Missing required parameter: company_name".to_string())
            }
        };

        let period = match period_arg(args) {
            Ok(p) => p,
            Err(result) => return result,
        };

        match self.service.company_stats(company, period) {
            Ok(stats) => ToolResult::json(&stats),
            Err(e) => ToolResult::from_lca(&e),
        }
    }

    fn get_top_sponsors(&self, args: &Value) -> ToolResult {
        let limit = usize_arg(args, "limit", DEFAULT_SPONSOR_LIMIT);
        let exclude = bool_arg(args, "exclude_agencies", true);
        let period = match period_arg(args) {
            Ok(p) => p,
            Err(result) => return result,
        };

        match self.service.top_sponsors(limit, exclude, period) {
            Ok(ranking) => ToolResult::json(&ranking),
            Err(e) => ToolResult::from_lca(&e),
        }
    }

    fn export_results(&self, args: &Value) -> ToolResult {
        let parsed =
            search_filter(args, DEFAULT_EXPORT_MAX).and_then(|f| Ok((f, period_arg(args)?)));
        let (filter, period) = match parsed {
            Ok(parsed) => parsed,
            Err(result) => return result,
        };
        let filename = args
            .get("filename")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_EXPORT_FILENAME);

        match self
            .service
            .export_results(&filter, filename, period)
        {
            Ok(summary) => ToolResult::json(&summary),
            Err(e) => ToolResult::from_lca(&e),
        }
    }

    async fn ask(&self, args: &Value) -> ToolResult {
        let prompt = match args.get("prompt").and_then(|v| v.as_str()) {
            Some(p) => p,
            None => return ToolResult::error("Missing required parameter: prompt".to_string()),
        };

        ToolResult::json(&self.service.ask(prompt).await)
    }
}

fn bool_arg(args: &Value, key: &str, default: bool) -> bool {
    args.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

fn usize_arg(args: &Value, key: &str, default: usize) -> usize {
    args.get(key)
        .and_then(|v| v.as_u64())
        .map(|n| n as usize)
        .unwrap_or(default)
}

fn string_arg(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn int_arg(args: &Value, key: &str) -> Result<Option<i64>, ToolResult> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| ToolResult::error(format!("Parameter {} must be an integer", key))),
    }
}

/// Optional `year`/`quarter` pair selecting a loaded period.
///
/// Both or neither must be given; an invalid pair is an error rather than a
/// fallback to the most recently loaded period.
pub fn period_arg(args: &Value) -> Result<Option<Period>, ToolResult> {
    match (int_arg(args, "year")?, int_arg(args, "quarter")?) {
        (None, None) => Ok(None),
        (Some(year), Some(quarter)) => Period::from_parts(year, quarter)
            .map(Some)
            .map_err(|e| ToolResult::from_lca(&e)),
        _ => Err(ToolResult::error(
            "Parameters year and quarter must be given together".to_string(),
        )),
    }
}

fn search_filter(args: &Value, default_max: usize) -> Result<SearchFilter, ToolResult> {
    let job_role = match args.get("job_role").and_then(|v| v.as_str()) {
        Some(r) => r.to_string(),
        None => {
            return Err(ToolResult::error(
                "Missing required parameter: job_role".to_string(),
            ))
        }
    };

    Ok(SearchFilter {
        job_role,
        city: string_arg(args, "city"),
        state: string_arg(args, "state"),
        min_wage: args.get("min_wage").and_then(|v| v.as_f64()),
        skip_agencies: bool_arg(args, "skip_agencies", true),
        max_results: usize_arg(args, "max_results", default_max),
        certified_only: bool_arg(args, "certified_only", false),
    })
}

fn function(name: &str, description: &str, parameters: Value) -> ToolDefinition {
    ToolDefinition {
        tool_type: "function".to_string(),
        function: FunctionDefinition {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        },
    }
}

/// Get the tool definitions.
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    let period_props = json!({
        "year": {
            "type": "integer",
            "description": "Fiscal year of a loaded period (default: most recently loaded)"
        },
        "quarter": {
            "type": "integer",
            "description": "Quarter 1-4 of a loaded period"
        }
    });

    let mut search_props = json!({
        "job_role": {
            "type": "string",
            "description": "Job title to search for (partial match)"
        },
        "city": {
            "type": "string",
            "description": "City filter (partial match)"
        },
        "state": {
            "type": "string",
            "description": "Two-letter state code"
        },
        "min_wage": {
            "type": "number",
            "description": "Minimum annual wage"
        },
        "max_results": {
            "type": "integer",
            "description": "Maximum results to return (default: 50)"
        },
        "skip_agencies": {
            "type": "boolean",
            "description": "Exclude staffing agencies and consultancies (default: true)"
        },
        "certified_only": {
            "type": "boolean",
            "description": "Only include certified applications (default: false)"
        }
    });
    merge(&mut search_props, &period_props);

    let mut export_props = search_props.clone();
    if let Some(obj) = export_props.as_object_mut() {
        obj.insert(
            "max_results".to_string(),
            json!({
                "type": "integer",
                "description": "Maximum results to export (default: 1000)"
            }),
        );
        obj.insert(
            "filename".to_string(),
            json!({
                "type": "string",
                "description": "Output filename relative to the export directory (default: h1b_results.csv)"
            }),
        );
    }

    let mut company_props = json!({
        "company_name": {
            "type": "string",
            "description": "Company name to search for"
        }
    });
    merge(&mut company_props, &period_props);

    let mut sponsor_props = json!({
        "limit": {
            "type": "integer",
            "description": "Number of companies to return (default: 20)"
        },
        "exclude_agencies": {
            "type": "boolean",
            "description": "Exclude staffing agencies (default: true)"
        }
    });
    merge(&mut sponsor_props, &period_props);

    vec![
        function(
            "load_h1b_data",
            "Download and load H-1B LCA disclosure data from the U.S. Department of Labor",
            json!({
                "type": "object",
                "properties": {
                    "year": {
                        "type": "integer",
                        "description": "Fiscal year (default: 2024)"
                    },
                    "quarter": {
                        "type": "integer",
                        "description": "Quarter 1-4 (default: 4)"
                    },
                    "force_download": {
                        "type": "boolean",
                        "description": "Force re-download even if cached (default: false)"
                    }
                },
                "required": []
            }),
        ),
        function(
            "search_h1b_jobs",
            "Search H-1B sponsoring companies by job role and location",
            json!({
                "type": "object",
                "properties": search_props,
                "required": ["job_role"]
            }),
        ),
        function(
            "get_company_stats",
            "Get statistics about H-1B sponsorships by company",
            json!({
                "type": "object",
                "properties": company_props,
                "required": ["company_name"]
            }),
        ),
        function(
            "get_top_sponsors",
            "List top H-1B sponsoring companies by volume",
            json!({
                "type": "object",
                "properties": sponsor_props,
                "required": []
            }),
        ),
        function(
            "export_results",
            "Export filtered H-1B data to CSV file",
            json!({
                "type": "object",
                "properties": export_props,
                "required": ["job_role"]
            }),
        ),
        function(
            "get_available_data",
            "Get available LCA data years and quarters",
            json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        ),
        function(
            "ask",
            "Talk to the H-1B search in simple words and it will figure out what you want",
            json!({
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "description": "What you want, e.g. 'Find software engineer jobs in Seattle, WA'"
                    }
                },
                "required": ["prompt"]
            }),
        ),
    ]
}

fn merge(target: &mut Value, extra: &Value) {
    if let (Some(t), Some(e)) = (target.as_object_mut(), extra.as_object()) {
        for (k, v) in e {
            t.insert(k.clone(), v.clone());
        }
    }
}
