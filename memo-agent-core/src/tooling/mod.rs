mod error;
mod invoker;
mod registry;

pub use error::{RegistryError, ToolError};
pub use invoker::ToolInvoker;
pub use registry::{RegisteredTool, ToolRegistry};
