mod loader;
mod models;

pub use loader::load;
pub use models::{
    AppConfig, DispatcherConfig, FlowConfig, PoolConfig, ServerConfig, TransportConfig,
};
