use super::RoundRobin as RoundRobinTrait;
use crate::stream::IntoStream;
use crate::utils;

use core::fmt;
use core::mem;
use core::pin::Pin;
use core::task::{Context, Poll};

use futures_core::Stream;
use pin_project::pin_project;

/// A stream which pulls one item from each stream in turn and yields them
/// together as a `Vec`.
///
/// This `struct` is created by the [`round_robin`] method on the
/// [`RoundRobin`] trait. See its documentation for more.
///
/// [`round_robin`]: crate::stream::RoundRobin::round_robin
/// [`RoundRobin`]: crate::stream::RoundRobin
#[must_use = "streams do nothing unless polled or .awaited"]
#[pin_project]
pub struct RoundRobin<S>
where
    S: Stream,
{
    /// The sources, or `None` once the merge is done.
    #[pin]
    streams: Option<Vec<S>>,
    /// Items of the round in progress, in source order.
    items: Vec<S::Item>,
}

impl<S> RoundRobin<S>
where
    S: Stream,
{
    pub(crate) fn new(streams: Vec<S>) -> Self {
        Self {
            items: Vec::with_capacity(streams.len()),
            streams: Some(streams),
        }
    }
}

impl<S> fmt::Debug for RoundRobin<S>
where
    S: Stream + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.streams.iter().flatten()).finish()
    }
}

impl<S> Stream for RoundRobin<S>
where
    S: Stream,
{
    type Item = Vec<S::Item>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        let exhausted = loop {
            let Some(streams) = this.streams.as_mut().as_pin_mut() else {
                return Poll::Ready(None);
            };
            let index = this.items.len();
            let Some(stream) = utils::get_pin_mut_from_vec(streams, index) else {
                // Every source produced an item, unless there are no sources.
                break index == 0;
            };
            match stream.poll_next(cx) {
                Poll::Ready(Some(item)) => this.items.push(item),
                Poll::Ready(None) => break true,
                Poll::Pending => return Poll::Pending,
            }
        };

        if exhausted {
            this.items.clear();
            this.streams.set(None);
            return Poll::Ready(None);
        }

        let len = this.items.len();
        Poll::Ready(Some(mem::replace(this.items, Vec::with_capacity(len))))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.streams {
            Some(streams) => utils::rounds_size_hint(
                streams.iter().map(Stream::size_hint),
                self.items.len(),
            ),
            None => (0, Some(0)),
        }
    }
}

impl<S> RoundRobinTrait for Vec<S>
where
    S: IntoStream,
{
    type Item = <RoundRobin<S::IntoStream> as Stream>::Item;
    type Stream = RoundRobin<S::IntoStream>;

    fn round_robin(self) -> Self::Stream {
        RoundRobin::new(self.into_iter().map(|s| s.into_stream()).collect())
    }
}
