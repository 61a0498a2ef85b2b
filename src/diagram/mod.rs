//! Diagram text handling: sections, repair, decoding, validation and DOT output.

pub mod dot;
pub mod graph;
pub mod parse;
pub mod repair;
pub mod sections;
pub mod validate;

pub use graph::{Edge, Graph, GraphJson};
pub use parse::{ParseDelta, ParseOptions, ParseOutcome, ResponseParser};
pub use repair::{AssistedRepair, RepairStrategy};
pub use validate::{Severity, ValidationReport, Violation};
