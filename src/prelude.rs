//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use volume_janitor::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{JanitorError, Result};

// Resource model
pub use crate::resource::calendar::{Calendar, FixedCalendar, SystemCalendar};
pub use crate::resource::directive::{DirectivePolicy, JanitorDirective};
pub use crate::resource::model::{MarkOutcome, Resource, ResourceType, TerminationMark};

// Rules
pub use crate::rules::base::{RetentionPolicy, Rule, RuleContext, VolumeCheck, VolumeRule};
pub use crate::rules::delete_on_termination::{DeleteOnTermination, DeleteOnTerminationRule};
pub use crate::rules::engine::{Evaluation, EvaluationReport, RuleEngine};
pub use crate::rules::old_detached::{OldDetachedVolume, OldDetachedVolumeRule};

// Logging
pub use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
