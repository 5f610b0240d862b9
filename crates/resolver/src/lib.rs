//! servicepath plan resolution.
//!
//! Given the types available in a working set and a requested output type,
//! the resolver discovers every service reachable from those types, relaxes
//! edge weights to find the cheapest producers, and walks them back into an
//! executable plan.

#![warn(missing_docs)]

mod diagnostics;
mod relax;
mod resolver;

pub use diagnostics::NearMiss;
pub use relax::{relax, BestEdge, Relaxation};
pub use resolver::{build_plan, PathDistances, PathResolver, PathSearch, PathsUsed};
