//! Volumes that have stayed detached longer than a threshold.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::core::errors::Result;
use crate::resource::calendar::Calendar;
use crate::resource::model::Resource;
use crate::rules::base::{
    RetentionPolicy, RuleContext, VolumeCheck, VolumeRule, non_negative_days,
};

/// Crawler-derived field holding the last detach time.
///
/// Accepts epoch milliseconds or an RFC 3339 timestamp.
pub const DETACH_TIME_FIELD: &str = "detachTime";

/// Eligibility check for volumes detached for more than `detach_days_threshold` days.
#[derive(Debug, Clone, Copy)]
pub struct OldDetachedVolume {
    detach_days_threshold: u32,
}

impl OldDetachedVolume {
    /// Fails when `detach_days_threshold` is negative.
    pub fn new(detach_days_threshold: i64) -> Result<Self> {
        Ok(Self {
            detach_days_threshold: non_negative_days("detach_days_threshold", detach_days_threshold)?,
        })
    }

    /// Days a volume may stay detached before it becomes eligible.
    pub fn detach_days_threshold(&self) -> u32 {
        self.detach_days_threshold
    }
}

/// Parse the crawler's detach time.
pub fn parse_detach_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(millis) = raw.trim().parse::<i64>() {
        return DateTime::from_timestamp_millis(millis);
    }
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

impl VolumeCheck for OldDetachedVolume {
    const NAME: &'static str = "old_detached_volume";

    fn check_eligibility(&self, resource: &mut Resource, ctx: &RuleContext<'_>) -> Result<bool> {
        let Some(raw) = resource.additional_field(DETACH_TIME_FIELD) else {
            return Ok(ctx.not_eligible(resource, "detach time unknown"));
        };
        let Some(detached_at) = parse_detach_time(raw) else {
            let details = format!("unparseable detach time {raw:?}");
            return Ok(ctx.not_eligible(resource, details));
        };

        let now = ctx.retention().calendar().now()?;
        let threshold = Duration::days(i64::from(self.detach_days_threshold));
        let overdue = detached_at
            .checked_add_signed(threshold)
            .is_some_and(|cutoff| cutoff < now);
        if !overdue {
            return Ok(ctx.not_eligible(
                resource,
                format!("detached less than {} days ago", self.detach_days_threshold),
            ));
        }

        let total_days =
            u64::from(self.detach_days_threshold) + u64::from(ctx.retention().retention_days());
        ctx.mark_after_retention(resource, &format!("Volume not attached for {total_days} days"))
    }
}

/// The full rule: owner-override protocol plus [`OldDetachedVolume`].
pub type OldDetachedVolumeRule = VolumeRule<OldDetachedVolume>;

impl VolumeRule<OldDetachedVolume> {
    /// Fails when either day count is negative.
    pub fn new(
        calendar: Arc<dyn Calendar>,
        detach_days_threshold: i64,
        retention_days: i64,
    ) -> Result<Self> {
        Ok(Self::from_check(
            OldDetachedVolume::new(detach_days_threshold)?,
            RetentionPolicy::new(calendar, retention_days)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::calendar::FixedCalendar;
    use crate::rules::base::Rule;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn rule() -> OldDetachedVolumeRule {
        OldDetachedVolumeRule::new(Arc::new(FixedCalendar::new(now())), 30, 7).unwrap()
    }

    fn detached_days_ago(id: &str, days: i64) -> Resource {
        let at = now() - Duration::days(days);
        Resource::detached_volume(id)
            .with_additional_field(DETACH_TIME_FIELD, at.timestamp_millis().to_string())
    }

    #[test]
    fn parses_millis_and_rfc3339() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            parse_detach_time(&expected.timestamp_millis().to_string()),
            Some(expected)
        );
        assert_eq!(parse_detach_time("2024-01-02T03:04:05Z"), Some(expected));
        assert_eq!(parse_detach_time("2024-01-02T05:04:05+02:00"), Some(expected));
        assert_eq!(parse_detach_time("last tuesday"), None);
    }

    #[test]
    fn long_detached_volume_is_marked() {
        let rule = rule();
        let mut vol = detached_days_ago("vol-1", 45);
        assert!(!rule.is_valid(&mut vol).unwrap());
        assert_eq!(
            vol.expected_termination_time(),
            Some(Utc.with_ymd_and_hms(2024, 6, 8, 0, 0, 0).unwrap())
        );
        assert_eq!(vol.termination_reason(), Some("Volume not attached for 37 days"));
    }

    #[test]
    fn recently_detached_volume_is_kept() {
        let rule = rule();
        let mut vol = detached_days_ago("vol-1", 10);
        assert!(rule.is_valid(&mut vol).unwrap());
        assert!(!vol.is_marked());
    }

    #[test]
    fn exactly_at_threshold_is_kept() {
        let rule = rule();
        let mut vol = detached_days_ago("vol-1", 30);
        assert!(rule.is_valid(&mut vol).unwrap());
    }

    #[test]
    fn missing_or_garbled_detach_time_is_kept() {
        let rule = rule();
        let mut missing = Resource::detached_volume("vol-1");
        let mut garbled =
            Resource::detached_volume("vol-2").with_additional_field(DETACH_TIME_FIELD, "yesterday");
        assert!(rule.is_valid(&mut missing).unwrap());
        assert!(rule.is_valid(&mut garbled).unwrap());
        assert!(!missing.is_marked());
        assert!(!garbled.is_marked());
    }

    #[test]
    fn opt_out_beats_age() {
        let rule = rule();
        let mut vol = detached_days_ago("vol-1", 400).with_tag("janitor", "donotmark");
        assert!(rule.is_valid(&mut vol).unwrap());
        assert!(!vol.is_marked());
    }

    #[test]
    fn repeated_pass_keeps_first_mark() {
        let calendar = Arc::new(FixedCalendar::new(now()));
        let rule = OldDetachedVolumeRule::new(calendar.clone(), 30, 7).unwrap();
        let mut vol = detached_days_ago("vol-1", 45);
        rule.is_valid(&mut vol).unwrap();
        let first = vol.termination().cloned();
        calendar.advance_days(3);
        assert!(!rule.is_valid(&mut vol).unwrap());
        assert_eq!(vol.termination().cloned(), first);
    }

    #[test]
    fn negative_threshold_rejected() {
        let err = OldDetachedVolumeRule::new(Arc::new(FixedCalendar::new(now())), -1, 7).unwrap_err();
        assert!(err.to_string().contains("detach_days_threshold"));
    }
}
