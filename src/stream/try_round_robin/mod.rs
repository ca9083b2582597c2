use futures_core::Stream;

pub(crate) mod array;
pub(crate) mod vec;

/// Interleave multiple fallible streams into a stream of rounds, ending on
/// the first error.
///
/// Works like [`RoundRobin`][crate::stream::RoundRobin] over streams of
/// `Result`s. The first `Err` pulled from any source is yielded as-is, the
/// round in progress is discarded and the stream ends; no further source is
/// polled.
///
/// # Examples
///
/// ```
/// use futures_functools::prelude::*;
/// use futures_lite::future::block_on;
/// use futures_lite::{stream, StreamExt};
///
/// block_on(async {
///     let a = stream::iter(vec![Ok(1), Ok(2), Ok(3)]);
///     let b = stream::iter(vec![Ok(10), Err("disconnected"), Ok(30)]);
///     let rounds: Vec<_> = vec![a, b].try_round_robin().collect().await;
///     assert_eq!(rounds, [Ok(vec![1, 10]), Err("disconnected")]);
/// })
/// ```
pub trait TryRoundRobin {
    /// The successful item: one value per source.
    type Ok;

    /// The error which aborts the merge.
    type Error;

    /// The stream type.
    type Stream: Stream<Item = Result<Self::Ok, Self::Error>>;

    /// Combine multiple fallible streams into a single stream of rounds.
    fn try_round_robin(self) -> Self::Stream;
}
