use super::error::RegistryError;
use crate::domain::{InputSchema, ToolDescriptor};
use crate::transport::ToolTransport;
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone)]
pub struct RegisteredTool {
    pub descriptor: ToolDescriptor,
    pub schema: InputSchema,
}

/// Tool catalogue of one session; immutable once loaded.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub async fn load(transport: &dyn ToolTransport) -> Result<Self, RegistryError> {
        let descriptors = transport.list_tools().await?;
        let registry = Self::from_descriptors(descriptors)?;
        info!(
            tools = ?registry.order,
            "tool registry loaded"
        );
        Ok(registry)
    }

    pub fn from_descriptors(descriptors: Vec<ToolDescriptor>) -> Result<Self, RegistryError> {
        if descriptors.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut tools = HashMap::with_capacity(descriptors.len());
        let mut order = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            if descriptor.name.trim().is_empty() {
                return Err(RegistryError::UnnamedTool);
            }
            let schema = InputSchema::parse(&descriptor.input_schema).map_err(|source| {
                RegistryError::MalformedSchema {
                    tool: descriptor.name.clone(),
                    source,
                }
            })?;
            if tools.contains_key(&descriptor.name) {
                return Err(RegistryError::DuplicateTool(descriptor.name));
            }
            order.push(descriptor.name.clone());
            tools.insert(descriptor.name.clone(), RegisteredTool { descriptor, schema });
        }
        Ok(Self { tools, order })
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Descriptors in the order the server advertised them.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.descriptor.clone())
            .collect()
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
