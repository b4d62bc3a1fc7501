//! Derivative-free searches used outside the gradient pipeline, e.g. to
//! tune a decision threshold or a regularization weight.

pub mod golden_section;
pub mod hill_climbing;

pub use golden_section::{GoldenSectionSearch, Goal, SearchInterval};
pub use hill_climbing::{HillClimbResult, HillClimbingSearch};
