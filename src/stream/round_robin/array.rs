use super::RoundRobin as RoundRobinTrait;
use crate::stream::IntoStream;
use crate::utils;

use core::array;
use core::fmt;
use core::mem::{self, MaybeUninit};
use core::pin::Pin;
use core::task::{Context, Poll};

use futures_core::Stream;
use pin_project::{pin_project, pinned_drop};

/// A stream which pulls one item from each stream in turn and yields them
/// together as an array.
///
/// This `struct` is created by the [`round_robin`] method on the
/// [`RoundRobin`] trait. See its documentation for more.
///
/// [`round_robin`]: crate::stream::RoundRobin::round_robin
/// [`RoundRobin`]: crate::stream::RoundRobin
#[must_use = "streams do nothing unless polled or .awaited"]
#[pin_project(PinnedDrop)]
pub struct RoundRobin<S, const N: usize>
where
    S: Stream,
{
    #[pin]
    streams: Option<[S; N]>,
    items: [MaybeUninit<S::Item>; N],
    /// How many slots of `items` are initialized; also the next source to poll.
    filled: usize,
}

impl<S, const N: usize> RoundRobin<S, N>
where
    S: Stream,
{
    pub(crate) fn new(streams: [S; N]) -> Self {
        Self {
            streams: Some(streams),
            items: array::from_fn(|_| MaybeUninit::uninit()),
            filled: 0,
        }
    }
}

impl<S, const N: usize> fmt::Debug for RoundRobin<S, N>
where
    S: Stream + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.streams.iter().flatten()).finish()
    }
}

impl<S, const N: usize> Stream for RoundRobin<S, N>
where
    S: Stream,
{
    type Item = [S::Item; N];

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        let exhausted = loop {
            let Some(streams) = this.streams.as_mut().as_pin_mut() else {
                return Poll::Ready(None);
            };
            let index = *this.filled;
            let Some(stream) = utils::get_pin_mut(streams, index) else {
                break N == 0;
            };
            match stream.poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    this.items[index].write(item);
                    *this.filled += 1;
                }
                Poll::Ready(None) => break true,
                Poll::Pending => return Poll::Pending,
            }
        };

        if exhausted {
            // SAFETY: exactly the first `filled` slots were written this round.
            unsafe { utils::drop_initialized(this.items, *this.filled) };
            *this.filled = 0;
            this.streams.set(None);
            return Poll::Ready(None);
        }

        debug_assert_eq!(*this.filled, N, "every source should have produced an item");
        *this.filled = 0;
        let items = mem::replace(this.items, array::from_fn(|_| MaybeUninit::uninit()));
        // SAFETY: the round completed, so every slot has been written.
        Poll::Ready(Some(unsafe { utils::array_assume_init(items) }))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.streams {
            Some(streams) => {
                utils::rounds_size_hint(streams.iter().map(Stream::size_hint), self.filled)
            }
            None => (0, Some(0)),
        }
    }
}

/// Drop the items of a round in progress on cancellation.
#[pinned_drop]
impl<S, const N: usize> PinnedDrop for RoundRobin<S, N>
where
    S: Stream,
{
    fn drop(self: Pin<&mut Self>) {
        let this = self.project();
        // SAFETY: `filled` tracks exactly which slots are initialized.
        unsafe { utils::drop_initialized(this.items, *this.filled) };
    }
}

impl<S, const N: usize> RoundRobinTrait for [S; N]
where
    S: IntoStream,
{
    type Item = <RoundRobin<S::IntoStream, N> as Stream>::Item;
    type Stream = RoundRobin<S::IntoStream, N>;

    fn round_robin(self) -> Self::Stream {
        RoundRobin::new(self.map(|s| s.into_stream()))
    }
}

#[cfg(test)]
mod tests {
    use crate::stream::RoundRobin;
    use futures_lite::future::{block_on, yield_now};
    use futures_lite::prelude::*;
    use futures_lite::stream;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn round_robin_array_3() {
        block_on(async {
            let a = stream::repeat(1).take(2);
            let b = stream::repeat(2).take(2);
            let c = stream::repeat(3).take(2);
            let mut s = RoundRobin::round_robin([a, b, c]);

            assert_eq!(s.next().await, Some([1, 2, 3]));
            assert_eq!(s.next().await, Some([1, 2, 3]));
            assert_eq!(s.next().await, None);
        })
    }

    #[test]
    fn shortest_source_wins() {
        block_on(async {
            let a = stream::iter(vec![1, 2, 3, 4]);
            let b = stream::iter(vec![10, 20]);
            let rounds: Vec<_> = [a, b].round_robin().collect().await;
            assert_eq!(rounds, [[1, 10], [2, 20]]);
        })
    }

    #[test]
    fn size_hint_follows_the_round() {
        block_on(async {
            let mut s = [stream::iter(0..3), stream::iter(0..5)].round_robin();
            assert_eq!(s.size_hint(), (3, Some(3)));
            assert_eq!(s.next().await, Some([0, 0]));
            assert_eq!(s.size_hint(), (2, Some(2)));
            while s.next().await.is_some() {}
            assert_eq!(s.size_hint(), (0, Some(0)));
        })
    }

    #[test]
    fn sources_are_polled_in_order() {
        block_on(async {
            let log = Rc::new(RefCell::new(vec![]));
            let source = |name: &'static str, delay: usize| {
                let log = log.clone();
                stream::unfold(0, move |n| {
                    let log = log.clone();
                    async move {
                        for _ in 0..delay {
                            yield_now().await;
                        }
                        log.borrow_mut().push(name);
                        (n < 2).then_some((n, n + 1))
                    }
                })
            };

            let s = [source("slow", 3), source("fast", 0)].round_robin();
            let rounds: Vec<_> = s.collect().await;
            assert_eq!(rounds, [[0, 0], [1, 1]]);
            // The third round stops at the first source; "fast" is not pulled.
            assert_eq!(*log.borrow(), ["slow", "fast", "slow", "fast", "slow"]);
        })
    }

    #[test]
    fn partial_round_is_dropped() {
        block_on(async {
            let dropped = Rc::new(RefCell::new(0));
            struct Tracked(Rc<RefCell<usize>>);
            impl Drop for Tracked {
                fn drop(&mut self) {
                    *self.0.borrow_mut() += 1;
                }
            }

            let items = vec![Tracked(dropped.clone())];
            let a = stream::iter(items);
            let b = stream::iter(Vec::<Tracked>::new());
            let mut s = [a, b].round_robin();
            assert!(s.next().await.is_none());
            assert_eq!(*dropped.borrow(), 1);
        })
    }
}
