use crate::stream::{IntoStream, RoundRobin};
use futures_core::Stream;

use super::round_robin::tuple::RoundRobin2;

/// An extension trait for the `Stream` trait.
pub trait StreamExt: Stream {
    /// Pair this stream with another, one item from each per round.
    ///
    /// # Examples
    ///
    /// ```
    /// use futures_functools::stream::StreamExt as _;
    /// use futures_lite::future::block_on;
    /// use futures_lite::{stream, StreamExt};
    ///
    /// block_on(async {
    ///     let names = stream::iter(["a", "b", "c"]);
    ///     let ids = stream::iter([1, 2]);
    ///     let pairs: Vec<_> = names.round_robin_with(ids).collect().await;
    ///     assert_eq!(pairs, [("a", 1), ("b", 2)]);
    /// })
    /// ```
    fn round_robin_with<S2>(self, other: S2) -> RoundRobin2<Self, S2::IntoStream>
    where
        Self: Sized,
        S2: IntoStream;
}

impl<S1> StreamExt for S1
where
    S1: Stream,
{
    fn round_robin_with<S2>(self, other: S2) -> RoundRobin2<Self, S2::IntoStream>
    where
        S2: IntoStream,
    {
        RoundRobin::round_robin((self, other))
    }
}
