use super::TryRoundRobin as TryRoundRobinTrait;
use crate::stream::IntoStream;
use crate::utils;

use core::fmt;
use core::mem;
use core::pin::Pin;
use core::task::{Context, Poll};

use futures_core::Stream;
use pin_project::pin_project;

/// A stream which pulls one successful item from each stream in turn, and
/// stops at the first error.
///
/// This `struct` is created by the [`try_round_robin`] method on the
/// [`TryRoundRobin`] trait. See its documentation for more.
///
/// [`try_round_robin`]: crate::stream::TryRoundRobin::try_round_robin
/// [`TryRoundRobin`]: crate::stream::TryRoundRobin
#[must_use = "streams do nothing unless polled or .awaited"]
#[pin_project]
pub struct TryRoundRobin<S, T, E>
where
    S: Stream<Item = Result<T, E>>,
{
    #[pin]
    streams: Option<Vec<S>>,
    items: Vec<T>,
}

impl<S, T, E> TryRoundRobin<S, T, E>
where
    S: Stream<Item = Result<T, E>>,
{
    pub(crate) fn new(streams: Vec<S>) -> Self {
        Self {
            items: Vec::with_capacity(streams.len()),
            streams: Some(streams),
        }
    }
}

impl<S, T, E> fmt::Debug for TryRoundRobin<S, T, E>
where
    S: Stream<Item = Result<T, E>> + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.streams.iter().flatten()).finish()
    }
}

impl<S, T, E> Stream for TryRoundRobin<S, T, E>
where
    S: Stream<Item = Result<T, E>>,
{
    type Item = Result<Vec<T>, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        let stop = loop {
            let Some(streams) = this.streams.as_mut().as_pin_mut() else {
                return Poll::Ready(None);
            };
            let index = this.items.len();
            let Some(stream) = utils::get_pin_mut_from_vec(streams, index) else {
                if index == 0 {
                    break None;
                }
                let len = this.items.len();
                return Poll::Ready(Some(Ok(mem::replace(this.items, Vec::with_capacity(len)))));
            };
            match stream.poll_next(cx) {
                Poll::Ready(Some(Ok(item))) => this.items.push(item),
                Poll::Ready(Some(Err(err))) => break Some(err),
                Poll::Ready(None) => break None,
                Poll::Pending => return Poll::Pending,
            }
        };

        this.items.clear();
        this.streams.set(None);
        Poll::Ready(stop.map(Err))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.streams {
            // Any source may still fail and end the merge early.
            Some(streams) => {
                let hints = streams.iter().map(Stream::size_hint);
                (0, utils::rounds_size_hint(hints, self.items.len()).1)
            }
            None => (0, Some(0)),
        }
    }
}

impl<S, T, E> TryRoundRobinTrait for Vec<S>
where
    S: IntoStream<Item = Result<T, E>>,
{
    type Ok = Vec<T>;
    type Error = E;
    type Stream = TryRoundRobin<S::IntoStream, T, E>;

    fn try_round_robin(self) -> Self::Stream {
        TryRoundRobin::new(self.into_iter().map(IntoStream::into_stream).collect())
    }
}
