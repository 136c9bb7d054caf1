//! A load test for a RESTful objects API.
//!
//! Every logical user runs one [`workflow`] iteration: it creates an object from a [`feeder`]
//! record, replaces it, reads it back and verifies with [`consistency`] that the object read
//! matches the object written. The [`runner`] keeps a constant number of users in flight for a
//! configured duration and aggregates latencies and failures into a report.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod cli;
pub mod config;
pub mod consistency;
pub mod error;
pub mod feeder;
pub mod http;
pub mod observability;
pub mod report;
pub mod runner;
pub mod workflow;

pub use crate::error::{FailureKind, IterationError, Step};
pub use crate::feeder::{Feeder, UserRecord};
pub use crate::http::HttpRemote;
pub use crate::runner::{Injection, Report, run};
pub use crate::workflow::{Iteration, SessionState, run_iteration};
