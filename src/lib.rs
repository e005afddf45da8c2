//! Greedy selection of maximally spread-out subsets from large candidate pools.
//!
//! A [`selector::DiversitySelector`] searches a pool through a
//! [`provider::DistanceOracle`]; the pools and extractors under [`pool`] and
//! [`features`] cover six-voice flute combinations and video frames.

/// Application directory resolution.
pub mod app_dirs;
/// Command-line flags shared by the binaries.
pub mod cli;
/// Run configuration.
pub mod config;
/// Audio and image feature extractors.
pub mod features;
/// Logging setup.
pub mod logging;
/// Result files.
pub mod output;
/// Candidate pools.
pub mod pool;
/// Feature caching and distance matrices.
pub mod provider;
/// End-to-end runs.
pub mod run;
/// The diversity search.
pub mod selector;
