pub mod apify;
pub mod executor;
mod http;
pub mod registry;
pub mod schema;
pub mod serper;
pub mod vision;
pub mod weather;

pub use apify::{ActivitiesTool, ApifyClient, HotelsTool};
pub use executor::ToolExecutor;
pub use registry::{
    ParamSpec, ParamType, Primitive, RegistryError, SpecError, Tool, ToolArgs, ToolError,
    ToolRegistry, ToolSpec,
};
pub use schema::tool_call_schema_json;
pub use serper::{ImageSearchTool, SerperClient, WebSearchTool, WebsiteContentTool};
pub use vision::VisionTool;
pub use weather::WeatherTool;
