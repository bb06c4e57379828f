//! Window and alignment validation utilities
//!
//! This module contains pure functions with no I/O dependencies. All
//! functions are arithmetic on offsets, granularities and file extents.

pub mod bounds;
pub mod format;

pub use bounds::{plan_window, validate_window_size, WindowPlan};
pub use format::{align_down, align_to_boundary, validate_granularity};
