pub mod app_config;
pub mod dispatch_reconcile;
pub mod observability;
pub mod remote_naming;

pub use app_config::{AppSection, SedaConfig};
pub use dispatch_reconcile::{DispatchConfig, DispatchService, ReconcileConfig, UnmatchedEventPolicy};
pub use observability::ObservabilityConfig;
pub use remote_naming::{NamingConfig, RemoteConfig};
