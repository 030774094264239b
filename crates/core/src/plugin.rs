//! Plugin trait: the abstraction over agent capabilities.
//!
//! Plugins are what give the agent the ability to act in the world:
//! run shell commands, read/edit files, search a codebase, inspect pull requests.
//!
//! Every plugin is self-describing (name, parameter schema, progress text) and
//! its `execute` never fails across the boundary: errors become data in a
//! [`PluginOutput`] so the model can see them and try again.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

use crate::error::ToolError;

/// JSON type of a plugin parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
}

/// One advertised parameter of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
}

impl PluginParameter {
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }
}

/// The schema advertised to the model for one plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<PluginParameter>,
}

impl PluginDescriptor {
    /// Render the parameter list as a JSON Schema `object`.
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for p in &self.parameters {
            properties.insert(
                p.name.clone(),
                serde_json::json!({
                    "type": p.param_type,
                    "description": p.description,
                }),
            );
            if p.required {
                required.push(Value::String(p.name.clone()));
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// The structured outcome of a plugin execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginOutput {
    pub success: bool,
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PluginOutput {
    /// A successful result. Non-object payloads are stored under `value`.
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: into_object(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Map::new(),
            error: Some(error.into()),
        }
    }

    /// A failure that still carries partial data (e.g. stdout of a failed command).
    pub fn failed_with(error: impl Into<String>, data: Value) -> Self {
        Self {
            success: false,
            data: into_object(data),
            error: Some(error.into()),
        }
    }

    /// Fold a fallible plugin body into an output.
    pub fn from_result(result: Result<Value, ToolError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::failed(e.to_string()),
        }
    }

    /// The flattened object the model sees: data plus `success`/`error`.
    pub fn to_json(&self) -> Value {
        let mut obj = self.data.clone();
        obj.insert("success".into(), Value::Bool(self.success));
        if let Some(error) = &self.error {
            obj.insert("error".into(), Value::String(error.clone()));
        }
        Value::Object(obj)
    }

    pub fn to_result_string(&self) -> String {
        self.to_json().to_string()
    }

    /// Look up a field of the payload.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

fn into_object(data: Value) -> Map<String, Value> {
    match data {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".into(), other);
            map
        }
    }
}

/// The core Plugin trait.
///
/// Each plugin (bash, read_file, edit_file, grep, ...) implements this trait.
/// Plugins are registered in the [`PluginRegistry`] and invoked by name.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// The unique name of this plugin (e.g., "bash", "read_file").
    fn name(&self) -> &str;

    /// A description of what this plugin does (sent to the model).
    fn description(&self) -> &str;

    /// Ordered parameter list.
    fn parameters(&self) -> Vec<PluginParameter>;

    /// Progress text shown while the plugin runs. Must be pure.
    fn describe_running(&self, _args: &Value) -> String {
        format!("Running {}...", self.name())
    }

    /// Progress text shown once the plugin finished. Must be pure.
    fn describe_completed(&self, _args: &Value, output: &PluginOutput) -> String {
        if output.success {
            format!("Completed {}", self.name())
        } else {
            format!("Failed {}", self.name())
        }
    }

    /// Execute the plugin. Never fails: errors are returned as data.
    async fn execute(&self, arguments: Value) -> PluginOutput;

    /// The descriptor advertised to the model.
    fn describe(&self) -> PluginDescriptor {
        PluginDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// A fixed, ordered collection of plugins.
///
/// Built once per process; read-only afterwards, so it can be shared behind
/// an `Arc` between orchestrators and the model adapter.
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
    index: HashMap<String, usize>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build a registry from an ordered list, rejecting duplicate names.
    pub fn from_plugins(plugins: Vec<Box<dyn Plugin>>) -> Result<Self, ToolError> {
        let mut registry = Self::new();
        for plugin in plugins {
            registry.register(plugin)?;
        }
        Ok(registry)
    }

    /// Register a plugin. Names must be unique.
    pub fn register(&mut self, plugin: Box<dyn Plugin>) -> Result<(), ToolError> {
        let name = plugin.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ToolError::Duplicate(name));
        }
        self.index.insert(name, self.plugins.len());
        self.plugins.push(plugin);
        Ok(())
    }

    /// Get a plugin by name.
    pub fn get(&self, name: &str) -> Option<&dyn Plugin> {
        self.index.get(name).map(|&i| self.plugins[i].as_ref())
    }

    /// Descriptors in registration order (for sending to the model).
    pub fn descriptors(&self) -> Vec<PluginDescriptor> {
        self.plugins.iter().map(|p| p.describe()).collect()
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Execute a plugin by name. Unknown names yield a failed output.
    pub async fn execute(&self, name: &str, arguments: Value) -> PluginOutput {
        match self.get(name) {
            Some(plugin) => plugin.execute(arguments).await,
            None => {
                debug!(tool = name, available = ?self.names(), "Unknown tool requested");
                PluginOutput::failed(format!("Unknown tool: {name}"))
            }
        }
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// --- Argument helpers shared by plugin implementations ---

/// A required string argument.
pub fn arg_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args[key]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

/// An optional string argument; empty strings count as absent.
pub fn arg_opt_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args[key].as_str().filter(|s| !s.is_empty())
}

/// An optional boolean argument. Accepts `"true"`/`"false"` strings too,
/// since some models quote every value.
pub fn arg_bool(args: &Value, key: &str, default: bool) -> bool {
    match &args[key] {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => default,
    }
}

/// An optional non-negative integer argument (numbers or numeric strings).
pub fn arg_u64(args: &Value, key: &str) -> Option<u64> {
    match &args[key] {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test plugin for unit tests.
    struct EchoPlugin;

    #[async_trait]
    impl Plugin for EchoPlugin {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters(&self) -> Vec<PluginParameter> {
            vec![PluginParameter::required("text", ParamType::String, "Text to echo")]
        }
        async fn execute(&self, arguments: Value) -> PluginOutput {
            PluginOutput::from_result(
                arg_str(&arguments, "text").map(|t| serde_json::json!({ "text": t })),
            )
        }
    }

    struct NamedPlugin(&'static str);

    #[async_trait]
    impl Plugin for NamedPlugin {
        fn name(&self) -> &str { self.0 }
        fn description(&self) -> &str { "" }
        fn parameters(&self) -> Vec<PluginParameter> { vec![] }
        async fn execute(&self, _arguments: Value) -> PluginOutput {
            PluginOutput::ok(Value::Null)
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = PluginRegistry::new();
        registry.register(Box::new(EchoPlugin)).unwrap();
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn registry_rejects_duplicates() {
        let mut registry = PluginRegistry::new();
        registry.register(Box::new(EchoPlugin)).unwrap();
        let err = registry.register(Box::new(EchoPlugin)).unwrap_err();
        assert!(matches!(err, ToolError::Duplicate(name) if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_preserves_order() {
        let registry = PluginRegistry::from_plugins(vec![
            Box::new(NamedPlugin("zeta")),
            Box::new(NamedPlugin("alpha")),
            Box::new(NamedPlugin("mid")),
        ])
        .unwrap();
        assert_eq!(registry.names(), vec!["zeta", "alpha", "mid"]);
        let descriptors = registry.descriptors();
        assert_eq!(descriptors[1].name, "alpha");
    }

    #[test]
    fn descriptor_json_schema() {
        let schema = EchoPlugin.describe().json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["text"]["type"], "string");
        assert_eq!(schema["required"], serde_json::json!(["text"]));
    }

    #[tokio::test]
    async fn registry_execute_plugin() {
        let mut registry = PluginRegistry::new();
        registry.register(Box::new(EchoPlugin)).unwrap();
        let output = registry
            .execute("echo", serde_json::json!({"text": "hello world"}))
            .await;
        assert!(output.success);
        assert_eq!(output.get("text").unwrap(), "hello world");
    }

    #[tokio::test]
    async fn missing_argument_becomes_data() {
        let output = EchoPlugin.execute(serde_json::json!({})).await;
        assert!(!output.success);
        assert!(output.error.unwrap().contains("Missing 'text'"));
    }

    #[tokio::test]
    async fn registry_execute_missing_plugin() {
        let registry = PluginRegistry::new();
        let output = registry.execute("nonexistent", serde_json::json!({})).await;
        assert!(!output.success);
        assert_eq!(output.error.as_deref(), Some("Unknown tool: nonexistent"));
    }

    #[test]
    fn output_json_merges_status() {
        let out = PluginOutput::failed_with("boom", serde_json::json!({"stdout": "x"}));
        let json = out.to_json();
        assert_eq!(json["stdout"], "x");
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "boom");
    }

    #[test]
    fn argument_helpers_are_lenient() {
        let args = serde_json::json!({"a": "true", "n": "12", "m": 3, "e": ""});
        assert!(arg_bool(&args, "a", false));
        assert!(arg_bool(&args, "missing", true));
        assert_eq!(arg_u64(&args, "n"), Some(12));
        assert_eq!(arg_u64(&args, "m"), Some(3));
        assert_eq!(arg_opt_str(&args, "e"), None);
    }
}
