//! Single-flight memoization and round-robin stream merging for async Rust.
//!
//! This library provides two building blocks:
//!
//! - [`cache::SingleFlightCache`]: a bounded, least-recently-used cache of
//!   asynchronous computations. Concurrent calls for the same key share one
//!   computation, and its outcome is replayed to everyone who asks later.
//! - [`stream::RoundRobin`]: interleaves several streams into one stream of
//!   rounds, pulling one item from each source in order and stopping as soon
//!   as any source is exhausted.
//!
//! # Examples
//!
//! Share one lookup between concurrent callers:
//!
//! ```rust
//! use futures_functools::cache::SingleFlightCache;
//! use futures_lite::future::block_on;
//!
//! block_on(async {
//!     let cache: SingleFlightCache<&str, usize> = SingleFlightCache::new();
//!     let a = cache.get_or_compute("hello", || async { Ok("hello".len()) });
//!     // Already registered: this factory is dropped without being called.
//!     let b = cache.get_or_compute("hello", || async { Ok(0) });
//!     assert_eq!(a.await, Ok(5));
//!     assert_eq!(b.await, Ok(5));
//! })
//! ```
//!
//! Zip heterogenous streams round by round:
//!
//! ```rust
//! use futures_functools::prelude::*;
//! use futures_lite::future::block_on;
//! use futures_lite::{stream, StreamExt};
//!
//! block_on(async {
//!     let ids = stream::iter([1, 2, 3]);
//!     let names = stream::iter(["one", "two"]);
//!     let rounds: Vec<_> = (ids, names).round_robin().collect().await;
//!     assert_eq!(rounds, [(1, "one"), (2, "two")]);
//! })
//! ```
//!
//! # Runtime
//!
//! Nothing here spawns tasks or depends on an executor. A cached computation
//! makes progress while at least one of its handles is being awaited; see
//! [`cache::Handle`] for how progress moves between handles.
//!
//! # Logging
//!
//! Cache lifecycle events are emitted through the [`log`] facade at `trace`
//! and `debug` level. No logger is installed by this crate.

#![deny(missing_debug_implementations, nonstandard_style)]
#![warn(missing_docs, unreachable_pub)]
#![allow(non_snake_case)]

mod utils;

/// The futures-functools prelude.
pub mod prelude {
    pub use super::stream::IntoStream as _;
    pub use super::stream::RoundRobin as _;
    pub use super::stream::StreamExt as _;
    pub use super::stream::TryRoundRobin as _;

    pub use super::cache::{Handle, SingleFlightCache};
}

pub mod cache;
pub mod stream;

/// Helper types for tuples.
pub mod tuple {
    pub use crate::stream::round_robin::tuple::{
        RoundRobin1, RoundRobin10, RoundRobin11, RoundRobin12, RoundRobin2, RoundRobin3,
        RoundRobin4, RoundRobin5, RoundRobin6, RoundRobin7, RoundRobin8, RoundRobin9,
    };
}

/// Helper types for fixed-length arrays.
pub mod array {
    pub use crate::stream::round_robin::array::RoundRobin;
    pub use crate::stream::try_round_robin::array::TryRoundRobin;
}

/// Helper types for contiguous growable array type with heap-allocated contents,
/// written `Vec<T>`.
pub mod vec {
    pub use crate::stream::round_robin::vec::RoundRobin;
    pub use crate::stream::try_round_robin::vec::TryRoundRobin;
}
