//! Rank run configuration and orchestration
//!
//! - [`spec`]: the JSON [`RankSpec`](spec::RankSpec) describing a run
//! - [`validation`]: rule engine producing diagnostics over a spec
//! - [`runner`]: the worker-pool scheduler and the [`RankRun`](runner::RankRun) driver

pub mod errors;
pub mod runner;
pub mod spec;
pub mod validation;
