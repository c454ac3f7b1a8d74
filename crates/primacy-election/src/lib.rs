//! primacy-election — self-election of a single primary per group.
//!
//! Every member of a horizontally-scaled group runs the same algorithm
//! against the same view of the group and independently reaches the same
//! answer: the member with the earliest launch time is primary. There is
//! no consensus protocol and no lock; the answer is best effort.
//!
//! # Architecture
//!
//! ```text
//! LeadershipElectionScheduler
//!   ├── OnceCell gate (priming round + task spawn, exactly once)
//!   ├── watch::Sender<ElectionState> (cached verdict)
//!   └── Background task (every interval)
//!       └── ElectionPoller
//!           ├── GroupDirectory::list_members(prefix)
//!           ├── InstanceRegistry::describe(ids)
//!           └── SelfIdentity::current_id()
//! ```
//!
//! # Failure policy
//!
//! A failed or timed-out round never reaches callers. The priming round
//! degrades to "not primary"; later rounds keep the previous verdict.

pub mod directory;
pub mod error;
pub mod inventory;
pub mod poller;
pub mod scheduler;

pub use directory::{GroupDirectory, InstanceRegistry, SelfIdentity};
pub use error::{ElectionError, ElectionResult, RemoteError};
pub use inventory::{FileInventory, FixedIdentity, StaticInventory};
pub use poller::{oldest_instance, ElectionPoller};
pub use scheduler::LeadershipElectionScheduler;
