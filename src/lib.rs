//! Hazard-pointer protected swappable pointer.
//!
//! A `HazardDomain<T>` publishes one record at a time. Any number of writers
//! replace it with `swap()`, and a fixed set of readers read it through hazard
//! slots. A reader announces the pointer it is about to dereference, re-checks
//! that it is still published, and only then reads it. A writer that evicted a
//! record waits until no slot announces it before freeing it.
//!
//! ```
//! use hazard_swap::HazardDomain;
//!
//! let domain = HazardDomain::builder().reader_slots(2).build(0u32).unwrap();
//!
//! let mut reader = domain.register_reader().unwrap();
//! {
//!     let guard = reader.protect();
//!     assert_eq!(*guard, 0);
//!
//!     // A writer may replace the record while it is being read.
//!     let old = domain.swap(1);
//!     assert!(old.is_protected());
//!     assert_eq!(*guard, 0);
//!     drop(guard);
//!
//!     // No announcement left: reclaiming returns immediately.
//!     assert_eq!(*old.reclaim(), 0);
//! }
//! assert_eq!(*reader.protect(), 1);
//! ```
//!
//! The `stress` module drives the protocol with many writers and poison
//! diagnostics; the `hazard-stress` binary runs it with fixed constants.
//!
//! 危险指针保护的可交换指针。
//! `HazardDomain<T>` 同一时刻发布一条记录。任意数量的写入者通过 `swap()` 替换它，
//! 固定数量的读者通过危险槽读取它。读者先声明即将解引用的指针，
//! 再复查它是否仍被发布，之后才读取。驱逐了某条记录的写入者
//! 会等到没有槽声明它之后才释放它。

mod domain;
pub mod error;
mod ptr;
mod reader;
mod retired;
mod state;
pub mod stress;
mod sync;

pub use domain::{HazardDomain, HazardDomainBuilder};
pub use error::{HazardError, Result};
pub use reader::{HazardReader, ReadGuard};
pub use retired::Retired;
pub use state::AnnounceOrdering;

#[cfg(all(test, not(feature = "loom")))]
mod tests;
