//! Resource records as populated by the crawler, plus the guarded termination mark.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// AWS state string for a volume that is not attached to any instance.
pub const STATE_AVAILABLE: &str = "available";

/// Kinds of resources the crawler reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    EbsVolume,
    EbsSnapshot,
    Instance,
    Image,
    Asg,
    LaunchConfig,
    Elb,
}

impl ResourceType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EbsVolume => "EBS_VOLUME",
            Self::EbsSnapshot => "EBS_SNAPSHOT",
            Self::Instance => "INSTANCE",
            Self::Image => "IMAGE",
            Self::Asg => "ASG",
            Self::LaunchConfig => "LAUNCH_CONFIG",
            Self::Elb => "ELB",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduled cleanup: when, and why. Time and reason are always set together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationMark {
    pub at: DateTime<Utc>,
    pub reason: String,
}

/// Result of [`Resource::mark`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The resource was unmarked and now carries the new mark.
    Marked,
    /// An earlier mark was kept; the new one was discarded.
    AlreadyMarked { existing: TerminationMark },
}

/// One cloud resource instance.
///
/// Descriptive fields and `state` belong to the crawler. The termination mark
/// is written only through [`Resource::mark`], so the first rule to mark a
/// resource wins and later passes cannot overwrite it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    id: String,
    resource_type: ResourceType,
    state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    launch_time: Option<DateTime<Utc>>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    additional_fields: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    termination: Option<TerminationMark>,
}

impl Resource {
    pub fn new(id: impl Into<String>, resource_type: ResourceType, state: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resource_type,
            state: state.into(),
            region: None,
            owner_email: None,
            description: None,
            launch_time: None,
            tags: HashMap::new(),
            additional_fields: HashMap::new(),
            termination: None,
        }
    }

    /// An unattached EBS volume, the shape every volume rule looks at.
    pub fn detached_volume(id: impl Into<String>) -> Self {
        Self::new(id, ResourceType::EbsVolume, STATE_AVAILABLE)
    }

    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_additional_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_fields.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    #[must_use]
    pub fn with_owner_email(mut self, owner_email: impl Into<String>) -> Self {
        self.owner_email = Some(owner_email.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_launch_time(mut self, launch_time: DateTime<Utc>) -> Self {
        self.launch_time = Some(launch_time);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn owner_email(&self) -> Option<&str> {
        self.owner_email.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn launch_time(&self) -> Option<DateTime<Utc>> {
        self.launch_time
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn tags(&self) -> &HashMap<String, String> {
        &self.tags
    }

    pub fn additional_field(&self, key: &str) -> Option<&str> {
        self.additional_fields.get(key).map(String::as_str)
    }

    pub fn additional_fields(&self) -> &HashMap<String, String> {
        &self.additional_fields
    }

    pub fn termination(&self) -> Option<&TerminationMark> {
        self.termination.as_ref()
    }

    pub fn expected_termination_time(&self) -> Option<DateTime<Utc>> {
        self.termination.as_ref().map(|mark| mark.at)
    }

    pub fn termination_reason(&self) -> Option<&str> {
        self.termination.as_ref().map(|mark| mark.reason.as_str())
    }

    pub fn is_marked(&self) -> bool {
        self.termination.is_some()
    }

    /// Schedule the resource for cleanup unless it is already scheduled.
    pub fn mark(&mut self, at: DateTime<Utc>, reason: impl Into<String>) -> MarkOutcome {
        if let Some(existing) = &self.termination {
            return MarkOutcome::AlreadyMarked {
                existing: existing.clone(),
            };
        }
        self.termination = Some(TerminationMark {
            at,
            reason: reason.into(),
        });
        MarkOutcome::Marked
    }
}
