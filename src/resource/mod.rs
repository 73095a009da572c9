//! Resource records, owner directives, and the calendar seam.

pub mod calendar;
pub mod directive;
pub mod model;
