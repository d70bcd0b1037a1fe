//! Conformance harness infrastructure
//!
//! Discovers corpus inputs, runs the subject binary on each of them under
//! every build mode, keeps the tallies and reports as it goes.

pub mod discovery;
pub mod invoker;
pub mod recorder;
pub mod reporter;
pub mod results_log;

pub use discovery::TestSuite;
pub use invoker::{BuildMode, Invoker};
pub use recorder::{Counters, InvocationResult, Recorder};
pub use reporter::{OutputFormat, TestReporter};
pub use results_log::ResultsLog;
