//! Property-based tests for the owner-override protocol.
//!
//! Filters must never mutate what they skip, opt-out must always win, and a
//! second pass must never change an existing mark.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;

use crate::resource::calendar::FixedCalendar;
use crate::resource::directive::start_of_day_utc;
use crate::resource::model::{Resource, ResourceType, STATE_AVAILABLE};
use crate::rules::base::Rule;
use crate::rules::delete_on_termination::{DELETE_ON_TERMINATION_FIELD, DeleteOnTerminationRule};

// ──────────────────── strategies ────────────────────

fn arb_non_volume_type() -> impl Strategy<Value = ResourceType> {
    prop_oneof![
        Just(ResourceType::EbsSnapshot),
        Just(ResourceType::Instance),
        Just(ResourceType::Image),
        Just(ResourceType::Asg),
        Just(ResourceType::LaunchConfig),
        Just(ResourceType::Elb),
    ]
}

fn arb_janitor_tag() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("donotmark".to_string())),
        (2000i32..2100, 1u32..=12, 1u32..=28)
            .prop_map(|(y, m, d)| Some(format!("{y:04}-{m:02}-{d:02}"))),
        "[a-zA-Z ./-]{0,16}".prop_map(Some),
    ]
}

fn arb_flag() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("true".to_string())),
        Just(Some("false".to_string())),
        "[A-Za-z]{0,6}".prop_map(Some),
    ]
}

fn arb_extra_fields() -> impl Strategy<Value = HashMap<String, String>> {
    prop::collection::hash_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 0..4)
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn rule(retention_days: i64) -> DeleteOnTerminationRule {
    DeleteOnTerminationRule::new(Arc::new(FixedCalendar::new(now())), retention_days).unwrap()
}

fn build(
    resource_type: ResourceType,
    state: &str,
    tag: Option<&str>,
    flag: Option<&str>,
    extra: &HashMap<String, String>,
) -> Resource {
    let mut resource = Resource::new("vol-prop", resource_type, state);
    for (k, v) in extra {
        resource = resource.with_additional_field(k.clone(), v.clone());
    }
    if let Some(tag) = tag {
        resource = resource.with_tag("janitor", tag);
    }
    if let Some(flag) = flag {
        resource = resource.with_additional_field(DELETE_ON_TERMINATION_FIELD, flag);
    }
    resource
}

// ──────────────────── properties ────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn non_volumes_are_never_touched(
        resource_type in arb_non_volume_type(),
        tag in arb_janitor_tag(),
        flag in arb_flag(),
        extra in arb_extra_fields(),
    ) {
        let mut resource = build(resource_type, STATE_AVAILABLE, tag.as_deref(), flag.as_deref(), &extra);
        let before = resource.clone();
        prop_assert!(rule(3).is_valid(&mut resource).unwrap());
        prop_assert_eq!(resource, before);
    }

    #[test]
    fn attached_volumes_are_never_touched(
        state in prop_oneof![Just("in-use"), Just("creating"), Just("deleting"), Just("error")],
        tag in arb_janitor_tag(),
        flag in arb_flag(),
    ) {
        let mut resource = build(ResourceType::EbsVolume, state, tag.as_deref(), flag.as_deref(), &HashMap::new());
        let before = resource.clone();
        prop_assert!(rule(3).is_valid(&mut resource).unwrap());
        prop_assert_eq!(resource, before);
    }

    #[test]
    fn opt_out_always_exempts(flag in arb_flag(), extra in arb_extra_fields()) {
        let mut resource = build(ResourceType::EbsVolume, STATE_AVAILABLE, Some("donotmark"), flag.as_deref(), &extra);
        prop_assert!(rule(3).is_valid(&mut resource).unwrap());
        prop_assert!(resource.expected_termination_time().is_none());
    }

    #[test]
    fn owner_date_is_applied_verbatim(
        y in 2000i32..2100,
        m in 1u32..=12,
        d in 1u32..=28,
        flag in arb_flag(),
    ) {
        let raw = format!("{y:04}-{m:02}-{d:02}");
        let mut resource = build(ResourceType::EbsVolume, STATE_AVAILABLE, Some(raw.as_str()), flag.as_deref(), &HashMap::new());
        prop_assert!(!rule(3).is_valid(&mut resource).unwrap());
        let date = NaiveDate::from_ymd_opt(y, m, d).unwrap();
        prop_assert_eq!(resource.expected_termination_time(), Some(start_of_day_utc(date)));
        prop_assert!(resource.termination_reason().unwrap().contains(&raw));
    }

    #[test]
    fn verdict_follows_flag_when_untagged(flag in arb_flag(), retention in 0i64..60) {
        let mut resource = build(ResourceType::EbsVolume, STATE_AVAILABLE, None, flag.as_deref(), &HashMap::new());
        let valid = rule(retention).is_valid(&mut resource).unwrap();
        if flag.as_deref() == Some("true") {
            prop_assert!(!valid);
            prop_assert_eq!(resource.expected_termination_time(), Some(now() + Duration::days(retention)));
        } else {
            prop_assert!(valid);
            prop_assert!(!resource.is_marked());
        }
    }

    #[test]
    fn second_pass_never_changes_the_mark(
        tag in arb_janitor_tag(),
        flag in arb_flag(),
        first_retention in 0i64..30,
        second_retention in 0i64..30,
    ) {
        let mut resource = build(ResourceType::EbsVolume, STATE_AVAILABLE, tag.as_deref(), flag.as_deref(), &HashMap::new());
        let first = rule(first_retention).is_valid(&mut resource).unwrap();
        let mark = resource.termination().cloned();
        let second = rule(second_retention).is_valid(&mut resource).unwrap();
        prop_assert_eq!(first, second);
        prop_assert_eq!(resource.termination().cloned(), mark);
    }
}
