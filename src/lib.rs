pub mod collect;
pub mod config;
pub mod error;
pub mod infer;
pub mod model;
pub mod query;
pub mod server;
pub mod store;

pub use collect::{AssetCollector, ClusterSource, Snapshot};
pub use config::{AppConfig, ClusterConfig, ServerConfig, StoreConfig};
pub use error::{KubeGraphError, KubeGraphResult};
pub use model::*;
pub use query::QueryService;
pub use store::{Channel, GraphStore, ImportReport};
