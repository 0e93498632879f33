//! Core library for yap: config, manifest, semver resolution, the registry
//! fetcher, the downloader/extractor, the materializer, the lockfile, and
//! the install orchestrator that ties them together.
//!
//! Used by the CLI binary; the pieces are independently usable (e.g. to
//! build a different front end over the same store and lockfile).

pub mod codec;
pub mod config;
pub mod downloader;
pub mod error;
pub mod fetcher;
pub mod install;
pub mod lockfile;
pub mod log;
pub mod manifest;
pub mod materializer;
pub mod paths;
pub mod semver_engine;
pub mod types;

pub use config::load_config;
pub use error::{Result, YapError};
pub use install::{add_package, install, run_pipeline};
pub use lockfile::{read_lockfile, write_lockfile};
pub use log::{log, log_error};
pub use manifest::{merged_dependencies, read_package_json};
pub use types::{Config, Dist, Lockfile, MPackage, Metadata, PackageRef, VersionMetadata};
