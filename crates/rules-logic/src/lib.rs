// rules-logic/src/lib.rs
// ============================================================================
// Module: Rules Logic Root
// Description: Public API surface for the condition algebra and pattern utilities.
// Purpose: Wire together the requirement tree, tri-state logic, and glob/duration/path
//          helpers shared by the Rule Index, Condition Evaluator, and Temporal Matchers.
// Dependencies: crate::{pattern, duration, path, requirement, tristate}
// ============================================================================

//! ## Overview
//! `rules-logic` is the domain-agnostic half of the condition system: a
//! composable Boolean algebra over typed predicates (generalised from a
//! requirement-tree design), the tri-state truth tables it evaluates with,
//! and the small set of pure parsing/matching utilities (segmented glob
//! matching, duration strings, dotted path lookups) that the rest of the
//! engine builds on.

// ============================================================================
// SECTION: Core Modules
// ============================================================================

pub mod duration;
pub mod path;
pub mod pattern;
pub mod requirement;
pub mod tristate;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use duration::DurationError;
pub use duration::parse_duration_ms;
pub use path::get_path;
pub use path::stringify_path_value;
pub use pattern::Separator;
pub use pattern::matches_pattern;
pub use requirement::Requirement;
pub use tristate::BochvarLogic;
pub use tristate::GroupCounts;
pub use tristate::KleeneLogic;
pub use tristate::LogicMode;
pub use tristate::NoopTrace;
pub use tristate::RequirementTrace;
pub use tristate::TriLogic;
pub use tristate::TriState;
