#![forbid(unsafe_code)]

//! Volume Janitor (vjan): cleanup eligibility engine for detached storage volumes.
//!
//! Given a crawled resource record, rules decide whether it should be marked for
//! deletion, when, and why:
//! 1. **Owner override**: the `janitor` tag either exempts a volume
//!    (`donotmark`) or pins its termination date (`YYYY-MM-DD`)
//! 2. **Variant checks**: orphaned DeleteOnTermination volumes and long-detached
//!    volumes are marked after a retention period
//! 3. **First writer wins**: an existing termination mark is never overwritten
//!
//! Discovery, deletion, and notification live outside this crate.
//!
//! # Library usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use volume_janitor::prelude::*;
//!
//! # fn main() -> volume_janitor::prelude::Result<()> {
//! let rule = DeleteOnTerminationRule::new(Arc::new(SystemCalendar), 3)?;
//! let mut volume = Resource::detached_volume("vol-0abc")
//!     .with_additional_field("deleteOnTermination", "true");
//! let keep = rule.is_valid(&mut volume)?;
//! assert!(!keep && volume.is_marked());
//! # Ok(())
//! # }
//! ```

pub mod prelude;

pub mod core;
pub mod logger;
pub mod resource;
pub mod rules;
