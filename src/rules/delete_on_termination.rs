//! Detached volumes whose last attachment had DeleteOnTermination set.
//!
//! AWS should have deleted such a volume together with its instance; a
//! surviving one is an orphan. The flag comes from attachment history, so this
//! rule only fires when the crawler records it.

use std::sync::Arc;

use crate::core::errors::Result;
use crate::resource::calendar::Calendar;
use crate::resource::model::Resource;
use crate::rules::base::{RetentionPolicy, RuleContext, VolumeCheck, VolumeRule};

/// Crawler-derived field holding the last attachment's DeleteOnTermination flag.
pub const DELETE_ON_TERMINATION_FIELD: &str = "deleteOnTermination";

/// Reason recorded on volumes this rule marks.
pub const TERMINATION_REASON: &str = "Not attached and DeleteOnTerminate flag was set";

/// Eligibility check for orphans left behind despite DeleteOnTermination.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOnTermination;

impl VolumeCheck for DeleteOnTermination {
    const NAME: &'static str = "delete_on_termination";

    fn check_eligibility(&self, resource: &mut Resource, ctx: &RuleContext<'_>) -> Result<bool> {
        // Exact, case-sensitive match.
        if resource.additional_field(DELETE_ON_TERMINATION_FIELD) != Some("true") {
            return Ok(ctx.not_eligible(resource, "DeleteOnTermination flag not set"));
        }
        ctx.mark_after_retention(resource, TERMINATION_REASON)
    }
}

/// The full rule: owner-override protocol plus [`DeleteOnTermination`].
pub type DeleteOnTerminationRule = VolumeRule<DeleteOnTermination>;

impl VolumeRule<DeleteOnTermination> {
    /// Fails when `retention_days` is negative.
    pub fn new(calendar: Arc<dyn Calendar>, retention_days: i64) -> Result<Self> {
        Ok(Self::from_check(
            DeleteOnTermination,
            RetentionPolicy::new(calendar, retention_days)?,
        ))
    }
}
