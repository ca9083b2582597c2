//! Composable asynchronous iteration.
//!
//! # Examples
//!
//! Pull one item from each stream in turn and group them per round:
//!
//! ```
//! use futures_functools::prelude::*;
//! use futures_lite::future::block_on;
//! use futures_lite::{stream, StreamExt};
//!
//! block_on(async {
//!     let a = stream::iter([1, 2, 3]);
//!     let b = stream::iter([10, 20, 30]);
//!     let rounds: Vec<_> = (a, b).round_robin().collect().await;
//!     assert_eq!(rounds, [(1, 10), (2, 20), (3, 30)]);
//! })
//! ```
//!
//! # Ordering and termination
//!
//! Within a round the sources are polled strictly one after the other, in
//! the order they were given: the second source is not polled before the
//! first has produced its item. A slow source therefore delays the whole
//! round, but output positions never depend on timing.
//!
//! As soon as any source is exhausted the merge ends, like [`Iterator::zip`]:
//! the round in progress is discarded, the remaining sources of that round
//! are not polled, and every source is dropped. Polling a finished merge
//! keeps returning `None`.
//!
//! | Name            | Item                  | When does it end?                 |
//! | ---             | ---                   | ---                               |
//! | `RoundRobin`    | `(T1, T2)`            | First source exhausted
//! | `TryRoundRobin` | `Result<(T1, T2), E>` | First source exhausted, or first `Err`
pub use into_stream::IntoStream;
pub use round_robin::RoundRobin;
pub use stream_ext::StreamExt;
pub use try_round_robin::TryRoundRobin;

mod into_stream;
pub(crate) mod round_robin;
mod stream_ext;
pub(crate) mod try_round_robin;
