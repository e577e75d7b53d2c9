//! RECON Playground
//!
//! A scripted session exercising the dispatcher end to end against an
//! in-process backend: a users list with a real query and mutations, and the
//! project page and activity feed reducers driven with caller context.

pub mod config;
pub mod error;
pub mod reducers;
pub mod server;
pub mod session;
pub mod telemetry;

pub use config::{LogFormat, PlaygroundConfig, SeedUser};
pub use error::{PlaygroundError, PlaygroundResult};
pub use session::{run, SessionReport};
