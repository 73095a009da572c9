//! Rule contract and the owner-override protocol shared by every volume rule.
//!
//! [`VolumeRule`] runs, in order:
//! 1. type filter (only `EBS_VOLUME`)
//! 2. state filter (only `available`, i.e. detached)
//! 3. janitor tag: opt-out exempts, an owner date marks, garbage is logged and ignored
//! 4. the variant's [`VolumeCheck::check_eligibility`]
//!
//! Each step can end evaluation. Variant checks never see opted-out or
//! owner-dated volumes.

#![allow(missing_docs)]

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::errors::{JanitorError, Result};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::resource::calendar::Calendar;
use crate::resource::directive::{
    DirectivePolicy, JanitorDirective, owner_date_reason, start_of_day_utc,
};
use crate::resource::model::{MarkOutcome, Resource, ResourceType, STATE_AVAILABLE};

/// A cleanup rule.
///
/// `Ok(true)` means the resource is not eligible for cleanup. `Ok(false)` means
/// it is eligible and carries a termination mark (possibly an earlier one).
/// `Err` is reserved for collaborator failures such as an unreachable calendar.
pub trait Rule: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_valid(&self, resource: &mut Resource) -> Result<bool>;
}

/// Calendar plus the number of business days a marked resource is kept.
#[derive(Clone)]
pub struct RetentionPolicy {
    calendar: Arc<dyn Calendar>,
    retention_days: u32,
}

impl std::fmt::Debug for RetentionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetentionPolicy")
            .field("retention_days", &self.retention_days)
            .finish_non_exhaustive()
    }
}

impl RetentionPolicy {
    /// Rejects negative retention here so evaluation never has to.
    pub fn new(calendar: Arc<dyn Calendar>, retention_days: i64) -> Result<Self> {
        Ok(Self {
            calendar,
            retention_days: non_negative_days("retention_days", retention_days)?,
        })
    }

    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    pub fn calendar(&self) -> &dyn Calendar {
        self.calendar.as_ref()
    }

    /// `retention_days` business days from now.
    pub fn termination_time(&self) -> Result<DateTime<Utc>> {
        let now = self.calendar.now()?;
        self.calendar.business_day(now, self.retention_days)
    }
}

/// Validate a day count coming from config or a caller.
pub fn non_negative_days(name: &str, days: i64) -> Result<u32> {
    u32::try_from(days).map_err(|_| {
        JanitorError::invalid_config(format!("{name} must be in [0, {}], got {days}", u32::MAX))
    })
}

/// What a variant check gets to work with.
pub struct RuleContext<'a> {
    rule: &'static str,
    retention: &'a RetentionPolicy,
    logger: Option<&'a ActivityLoggerHandle>,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        rule: &'static str,
        retention: &'a RetentionPolicy,
        logger: Option<&'a ActivityLoggerHandle>,
    ) -> Self {
        Self {
            rule,
            retention,
            logger,
        }
    }

    pub fn rule(&self) -> &'static str {
        self.rule
    }

    pub fn retention(&self) -> &RetentionPolicy {
        self.retention
    }

    pub fn emit(&self, event: ActivityEvent) {
        if let Some(logger) = self.logger {
            logger.send(event);
        }
    }

    /// Mark `resource` for cleanup after the retention period.
    ///
    /// An already-marked resource is left alone and the calendar is not
    /// consulted. Always reports eligible (`Ok(false)`) on success.
    pub fn mark_after_retention(&self, resource: &mut Resource, reason: &str) -> Result<bool> {
        if let Some(existing) = resource.expected_termination_time() {
            self.emit(self.already_marked(resource, existing));
            return Ok(false);
        }
        let at = self.retention.termination_time()?;
        self.apply_mark(resource, at, reason);
        Ok(false)
    }

    /// Guarded write of a termination mark with the matching log record.
    fn apply_mark(&self, resource: &mut Resource, at: DateTime<Utc>, reason: &str) {
        match resource.mark(at, reason) {
            MarkOutcome::Marked => self.emit(ActivityEvent::ResourceMarked {
                resource_id: resource.id().to_string(),
                rule: self.rule.to_string(),
                termination_time: at,
                reason: reason.to_string(),
            }),
            MarkOutcome::AlreadyMarked { existing } => {
                self.emit(self.already_marked(resource, existing.at));
            }
        }
    }

    /// Record a not-eligible verdict and return `true`.
    pub fn not_eligible(&self, resource: &Resource, details: impl Into<String>) -> bool {
        self.emit(ActivityEvent::NotEligible {
            resource_id: resource.id().to_string(),
            rule: self.rule.to_string(),
            details: details.into(),
        });
        true
    }

    fn already_marked(&self, resource: &Resource, at: DateTime<Utc>) -> ActivityEvent {
        ActivityEvent::AlreadyMarked {
            resource_id: resource.id().to_string(),
            rule: self.rule.to_string(),
            termination_time: at,
        }
    }
}

/// Variant-specific eligibility for one orphaning pattern.
///
/// Called only for detached volumes with no effective owner directive.
pub trait VolumeCheck: Send + Sync {
    /// Stable rule name used in logs and reports.
    const NAME: &'static str;

    fn check_eligibility(&self, resource: &mut Resource, ctx: &RuleContext<'_>) -> Result<bool>;
}

/// A volume rule: the owner-override protocol wrapped around a [`VolumeCheck`].
#[derive(Debug)]
pub struct VolumeRule<C> {
    check: C,
    retention: RetentionPolicy,
    directives: DirectivePolicy,
    logger: Option<ActivityLoggerHandle>,
    override_events: bool,
}

impl<C: VolumeCheck> VolumeRule<C> {
    pub fn from_check(check: C, retention: RetentionPolicy) -> Self {
        Self {
            check,
            retention,
            directives: DirectivePolicy::default(),
            logger: None,
            override_events: true,
        }
    }

    #[must_use]
    pub fn with_directives(mut self, directives: DirectivePolicy) -> Self {
        self.directives = directives;
        self
    }

    #[must_use]
    pub fn with_logger(mut self, logger: ActivityLoggerHandle) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Whether filter, opt-out and malformed-tag outcomes are logged by this
    /// rule. In a chain only the first rule needs to record them, since they
    /// do not depend on the variant.
    #[must_use]
    pub fn with_override_events(mut self, enabled: bool) -> Self {
        self.override_events = enabled;
        self
    }

    pub fn check(&self) -> &C {
        &self.check
    }

    pub fn retention(&self) -> &RetentionPolicy {
        &self.retention
    }

    fn context(&self) -> RuleContext<'_> {
        RuleContext::new(C::NAME, &self.retention, self.logger.as_ref())
    }

    fn override_event(&self, ctx: &RuleContext<'_>, event: ActivityEvent) {
        if self.override_events {
            ctx.emit(event);
        }
    }

    /// Record why the protocol skipped `resource` and return `true`.
    fn filtered(&self, ctx: &RuleContext<'_>, resource: &Resource, details: String) -> bool {
        self.override_event(
            ctx,
            ActivityEvent::NotEligible {
                resource_id: resource.id().to_string(),
                rule: C::NAME.to_string(),
                details,
            },
        );
        true
    }
}

impl<C: VolumeCheck> Rule for VolumeRule<C> {
    fn name(&self) -> &'static str {
        C::NAME
    }

    fn is_valid(&self, resource: &mut Resource) -> Result<bool> {
        let ctx = self.context();
        if resource.resource_type() != ResourceType::EbsVolume {
            let details = format!("resource type {} not governed", resource.resource_type());
            return Ok(self.filtered(&ctx, resource, details));
        }
        if resource.state() != STATE_AVAILABLE {
            let details = format!("volume state {:?} is not {STATE_AVAILABLE}", resource.state());
            return Ok(self.filtered(&ctx, resource, details));
        }

        match self.directives.directive_for(resource) {
            JanitorDirective::Unset => {}
            JanitorDirective::OptOut => {
                self.override_event(
                    &ctx,
                    ActivityEvent::OptedOut {
                        resource_id: resource.id().to_string(),
                        rule: C::NAME.to_string(),
                    },
                );
                return Ok(true);
            }
            JanitorDirective::OwnerDate { date, raw } => {
                let at = start_of_day_utc(date);
                if let MarkOutcome::AlreadyMarked { existing } =
                    resource.mark(at, owner_date_reason(&raw))
                {
                    ctx.emit(ctx.already_marked(resource, existing.at));
                } else {
                    ctx.emit(ActivityEvent::OwnerDateApplied {
                        resource_id: resource.id().to_string(),
                        rule: C::NAME.to_string(),
                        tag_value: raw,
                        termination_time: at,
                    });
                }
                return Ok(false);
            }
            JanitorDirective::Malformed(raw) => {
                self.override_event(
                    &ctx,
                    ActivityEvent::MalformedJanitorTag {
                        resource_id: resource.id().to_string(),
                        rule: C::NAME.to_string(),
                        tag_value: raw,
                    },
                );
            }
        }

        self.check.check_eligibility(resource, &ctx)
    }
}
