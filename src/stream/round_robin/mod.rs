use futures_core::Stream;

pub(crate) mod array;
pub(crate) mod tuple;
pub(crate) mod vec;

/// Interleave multiple streams into a stream of rounds.
///
/// Each round pulls exactly one item from every source, in order, and
/// yields them together. The stream ends as soon as any source is
/// exhausted; a partially filled round is never yielded.
///
/// # Examples
///
/// ```
/// use futures_functools::prelude::*;
/// use futures_lite::future::block_on;
/// use futures_lite::{stream, StreamExt};
///
/// block_on(async {
///     let a = stream::iter(vec![1, 2, 3, 4]);
///     let b = stream::iter(vec![10, 20]);
///     let rounds: Vec<_> = vec![a, b].round_robin().collect().await;
///     assert_eq!(rounds, [vec![1, 10], vec![2, 20]]);
/// })
/// ```
pub trait RoundRobin {
    /// The item of the resulting stream: one value per source.
    type Item;

    /// The stream type.
    type Stream: Stream<Item = Self::Item>;

    /// Combine multiple streams into a single stream of rounds.
    fn round_robin(self) -> Self::Stream;
}
