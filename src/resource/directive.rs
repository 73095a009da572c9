//! Owner directives carried in the reserved janitor tag.
//!
//! The tag accepts two forms: the opt-out sentinel, or a `YYYY-MM-DD` date the
//! owner wants the resource cleaned up on. Anything else is malformed and must
//! not block the default rule logic.

#![allow(missing_docs)]

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::resource::model::Resource;

/// Default reserved tag key.
pub const DEFAULT_TAG_KEY: &str = "janitor";
/// Default opt-out sentinel value.
pub const DEFAULT_OPT_OUT_VALUE: &str = "donotmark";
/// Date format owners use for an explicit termination date.
pub const OWNER_DATE_FORMAT: &str = "%Y-%m-%d";

/// Where to find the janitor tag and what the opt-out sentinel looks like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectivePolicy {
    pub tag_key: String,
    pub opt_out_value: String,
}

impl Default for DirectivePolicy {
    fn default() -> Self {
        Self {
            tag_key: DEFAULT_TAG_KEY.to_string(),
            opt_out_value: DEFAULT_OPT_OUT_VALUE.to_string(),
        }
    }
}

impl DirectivePolicy {
    /// Read and classify the janitor tag on `resource`.
    pub fn directive_for(&self, resource: &Resource) -> JanitorDirective {
        JanitorDirective::parse(resource.tag(&self.tag_key), &self.opt_out_value)
    }
}

/// Classified janitor tag value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JanitorDirective {
    /// No janitor tag present.
    Unset,
    /// The owner permanently exempted the resource.
    OptOut,
    /// The owner picked a termination date. `raw` is the tag as written.
    OwnerDate { date: NaiveDate, raw: String },
    /// A tag value that is neither the sentinel nor a date.
    Malformed(String),
}

impl JanitorDirective {
    /// Classify a raw tag value. The sentinel match is exact and case-sensitive.
    pub fn parse(raw: Option<&str>, opt_out_value: &str) -> Self {
        let Some(raw) = raw else {
            return Self::Unset;
        };
        if raw == opt_out_value {
            return Self::OptOut;
        }
        match NaiveDate::parse_from_str(raw, OWNER_DATE_FORMAT) {
            Ok(date) => Self::OwnerDate {
                date,
                raw: raw.to_string(),
            },
            Err(_) => Self::Malformed(raw.to_string()),
        }
    }

    /// Short label for logs and CLI output.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::OptOut => "opt_out",
            Self::OwnerDate { .. } => "owner_date",
            Self::Malformed(_) => "malformed",
        }
    }
}

/// Start of the given day in UTC.
pub fn start_of_day_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Termination reason recorded for an owner-chosen date.
pub fn owner_date_reason(raw: &str) -> String {
    format!("User specified termination date {raw}")
}
