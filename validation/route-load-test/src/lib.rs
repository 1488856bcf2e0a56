//! Load testing framework for GraphHopper-compatible routing services.
//!
//! This crate provides tools to:
//! - Generate random source/target coordinate pairs around a center point
//! - Start workers on a staggered schedule, each hammering one target
//! - Skip unroutable sources and stop workers whose target keeps failing
//! - Reduce every observation into latency and success statistics
//! - Output results as an HTML report, a console table or JSON

pub mod client;
pub mod config;
pub mod coordinate;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod preflight;
pub mod report;
pub mod runner;
pub mod worker;

pub use client::{HttpRouteClient, RouteClient, RouteOutcome, RouteRequest};
pub use config::{RunConfig, RunSettings};
pub use coordinate::Coordinate;
pub use error::ConfigError;
pub use generator::{sample_in_annulus, sample_within_radius, CoordinateSampler};
pub use metrics::{ObservationSet, Statistics};
pub use report::ResultsReport;
pub use runner::{LoadRunner, RunPhase};
pub use worker::{FailureTracker, Worker, WorkerExit, WorkerState, WorkerSummary, FAILURE_THRESHOLD, MAX_SOURCE_ATTEMPTS};
