// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! # Capability Registry
//!
//! Static mapping from tool name to a `ToolSpec`: input/output JSON Schemas,
//! handler, and approval requirement. Schemas are derived from typed payload
//! structs via `schemars` and compiled once with `jsonschema` at registration
//! time, so the gateway validates against pre-built validators on every call.
//!
//! Registering a duplicate name is a fatal configuration error surfaced at
//! process startup. The registry is immutable once built and shared behind
//! an `Arc` for concurrent reads.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use jsonschema::Validator;
use schemars::JsonSchema;
use serde_json::Value;
use thiserror::Error;

use crate::application::GatewayStores;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Tool already registered: {0}")]
    Duplicate(String),

    #[error("Invalid schema for tool {0}: {1}")]
    InvalidSchema(String, String),
}

/// Per-invocation context handed to tool handlers.
#[derive(Clone)]
pub struct ExecutionContext {
    pub run_id: String,
    pub step_id: Option<i64>,
    pub requester: Option<String>,
    pub stores: Arc<GatewayStores>,
}

/// A tool handler runs against already schema-validated input and returns a
/// JSON value the gateway validates against the output schema. Any error is
/// captured on the call record as a short classified message.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, input: Value, ctx: ExecutionContext) -> anyhow::Result<Value>;
}

pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    pub requires_approval: bool,
    input_schema: Validator,
    output_schema: Validator,
    handler: Arc<dyn ToolHandler>,
}

impl ToolSpec {
    /// Build a spec whose input/output schemas are derived from the typed
    /// payload structs `I` and `O`.
    pub fn new<I, O>(
        name: impl Into<String>,
        description: impl Into<Option<String>>,
        requires_approval: bool,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<Self, RegistryError>
    where
        I: JsonSchema,
        O: JsonSchema,
    {
        let name = name.into();
        let input_schema = compile_schema::<I>(&name)?;
        let output_schema = compile_schema::<O>(&name)?;
        Ok(Self {
            name,
            description: description.into(),
            requires_approval,
            input_schema,
            output_schema,
            handler,
        })
    }

    pub fn validate_input(&self, value: &Value) -> Result<(), String> {
        collect_errors(&self.input_schema, value)
    }

    pub fn validate_output(&self, value: &Value) -> Result<(), String> {
        collect_errors(&self.output_schema, value)
    }

    pub async fn invoke(&self, input: Value, ctx: ExecutionContext) -> anyhow::Result<Value> {
        self.handler.call(input, ctx).await
    }
}

fn compile_schema<T: JsonSchema>(tool_name: &str) -> Result<Validator, RegistryError> {
    let schema = schemars::schema_for!(T);
    let schema_value = serde_json::to_value(schema)
        .map_err(|e| RegistryError::InvalidSchema(tool_name.to_string(), e.to_string()))?;
    jsonschema::validator_for(&schema_value)
        .map_err(|e| RegistryError::InvalidSchema(tool_name.to_string(), e.to_string()))
}

fn collect_errors(validator: &Validator, value: &Value) -> Result<(), String> {
    let messages: Vec<String> = validator.iter_errors(value).map(|e| e.to_string()).collect();
    if messages.is_empty() {
        Ok(())
    } else {
        Err(messages.join("; "))
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<ToolSpec>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: ToolSpec) -> Result<(), RegistryError> {
        if self.tools.contains_key(&spec.name) {
            return Err(RegistryError::Duplicate(spec.name));
        }
        self.tools.insert(spec.name.clone(), Arc::new(spec));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<ToolSpec>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<Arc<ToolSpec>> {
        let mut specs: Vec<Arc<ToolSpec>> = self.tools.values().cloned().collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, JsonSchema)]
    struct PingInput {
        message: String,
    }

    #[derive(Debug, Serialize, Deserialize, JsonSchema)]
    struct PingOutput {
        message: String,
    }

    struct PingHandler;

    #[async_trait]
    impl ToolHandler for PingHandler {
        async fn call(&self, input: Value, _ctx: ExecutionContext) -> anyhow::Result<Value> {
            Ok(input)
        }
    }

    fn ping_spec(name: &str) -> ToolSpec {
        ToolSpec::new::<PingInput, PingOutput>(name, None, false, Arc::new(PingHandler)).unwrap()
    }

    #[test]
    fn register_and_get() {
        let mut registry = ToolRegistry::new();
        registry.register(ping_spec("system.ping")).unwrap();
        assert!(registry.get("system.ping").is_some());
        assert!(registry.get("system.pong").is_none());
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn duplicate_registration_fails_and_keeps_first() {
        let mut registry = ToolRegistry::new();
        registry.register(ping_spec("system.ping")).unwrap();
        let second =
            ToolSpec::new::<PingInput, PingOutput>("system.ping", None, true, Arc::new(PingHandler))
                .unwrap();
        let err = registry.register(second).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(name) if name == "system.ping"));
        // The first spec stays installed.
        assert!(!registry.get("system.ping").unwrap().requires_approval);
    }

    #[test]
    fn input_validation_reports_schema_errors() {
        let spec = ping_spec("system.ping");
        assert!(spec.validate_input(&serde_json::json!({"message": "hi"})).is_ok());
        let err = spec.validate_input(&serde_json::json!({})).unwrap_err();
        assert!(err.contains("message"));
        assert!(spec.validate_input(&serde_json::json!({"message": 42})).is_err());
    }
}
