//! cloudpull: a local front end that drives an external cloud-storage CLI
//! as a subprocess to list files, report quota and download content.
//!
//! The crate's substance is the bounded subprocess pipeline: deadline- and
//! memory-bounded output capture ([`runner`]), streaming/paginated parsing
//! of line-oriented listings ([`stream`], [`listing`]), resilient size and
//! quota parsing ([`size`], [`quota`]), adaptive download concurrency
//! ([`concurrency`]) and per-operation metrics ([`metrics`]). The wire
//! protocol, authentication and the transfers themselves all belong to the
//! external tool; [`client`] only manages how that tool is invoked, bounded
//! and observed.

pub mod cli;
pub mod client;
pub mod concurrency;
pub mod config;
pub mod contract;
pub mod error;
pub mod listing;
pub mod metrics;
pub mod quota;
pub mod runner;
pub mod size;
pub mod stream;

pub use client::Client;
pub use error::Error;
