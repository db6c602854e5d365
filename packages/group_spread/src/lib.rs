//! Many-processor systems partition their logical processors into *groups*, each small enough
//! to be addressed by a single scheduling affinity mask. Many applications only ever get
//! scheduled on the one group they started in, leaving the rest of the machine idle.
//!
//! This package watches the live thread population of one target process and actively places
//! newly created threads onto underused processor groups, so the process grows into the whole
//! machine instead of saturating a single group.
//!
//! This is part of the [Folo project](https://github.com/folo-rs/folo) that provides mechanisms
//! for high-performance hardware-aware programming in Rust.
//!
//! # How it works
//!
//! A monitoring session re-enumerates the target's threads on a refresh interval and compares
//! each snapshot against the previously tracked population. Threads that disappeared release
//! their group slot; threads seen for the first time are assigned a group by the selected
//! [`PlacementPolicy`] and bound to that group's full affinity mask. Threads that were already
//! tracked are never rebalanced. When every tracked thread has disappeared, the target is
//! presumed to have exited and the session stops on its own.
//!
//! # Quick start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use group_spread::GroupSpreader;
//!
//! let mut spreader = GroupSpreader::new();
//! let (completion_tx, completion_rx) = oneshot::channel();
//!
//! // Monitor process 1234, refreshing twice per second.
//! spreader.start_async(1234, Duration::from_millis(500), completion_tx);
//!
//! // ... later, or upon the completion signal firing:
//! spreader.stop();
//! ```
//!
//! One spreader instance manages exactly one target process. Multiple spreaders may run in the
//! same host process; the one contended resource, thread enumeration, is serialized internally.
//!
//! # Operating system compatibility
//!
//! On Windows the group partition is the operating system's own processor group concept. On
//! Linux, which has no scheduling-mask partition, NUMA nodes take that role. Machines exposing
//! a single group (or a single NUMA node) produce
//! [`TopologyError::InsufficientGroups`] - there is nothing useful to spread across on such
//! hardware.
//!
//! Other operating systems compile with a fallback that reports a single group, so sessions
//! on them abort the same way instead of failing the build.

mod error;
mod policy;
mod primitive_types;
mod processes;
mod reconciler;
mod session;
mod snapshot;
mod spreader;
mod topology;
mod tracker;

pub use error::*;
pub use policy::*;
pub use primitive_types::*;
pub use processes::*;
pub use reconciler::SessionOutcome;
pub use spreader::*;
pub use topology::*;

mod pal;
