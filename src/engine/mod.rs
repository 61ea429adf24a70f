//! Execution engine: runs compiled plans against the query engine and
//! turns engine errors into structured diagnostics.

pub mod diagnostics;
pub mod executor;

pub use diagnostics::{classify_engine_error, EngineErrorClass};
pub use executor::run;
