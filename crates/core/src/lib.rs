pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod naming;
pub mod retry;
pub mod traits;

pub use config::*;
pub use errors::*;
pub use logging::{init_logging, LoggingError};
pub use models::{
    EventTask, InvocationContext, PolicyDocument, Schedule, ScheduleContext, ScheduleOptions,
    TaskArgs, TaskEnvelope, TaskPath, TimeWindow,
};
pub use naming::{generate_uid, NameTemplate, NameVars, ResourceNames};
pub use retry::RetryPolicy;
pub use traits::{Credentials, RemoteCallError, ServiceClient, Session};
