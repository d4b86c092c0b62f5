pub mod adapters;
#[cfg(feature = "cli")]
pub mod app;
pub mod config;
pub mod core;
pub mod dashboard;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::{CliArgs, StoreKind};

pub use config::AppConfig;
pub use crate::core::{etl::EtlEngine, worker::RecordProcessor};
pub use domain::ports::Stores;
pub use utils::error::{EtlError, Result};
