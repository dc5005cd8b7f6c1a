pub mod client;
pub mod locator;
pub mod memory_cloud;
pub mod types;

pub use client::{translate_error, RemoteClient};
pub use locator::{format_arn, ResourceLocator};
pub use memory_cloud::{CloudSnapshot, InMemoryCloud};
