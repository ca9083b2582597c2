use super::TryRoundRobin as TryRoundRobinTrait;
use crate::stream::IntoStream;
use crate::utils;

use core::array;
use core::fmt;
use core::mem::{self, MaybeUninit};
use core::pin::Pin;
use core::task::{Context, Poll};

use futures_core::Stream;
use pin_project::{pin_project, pinned_drop};

/// A stream which pulls one successful item from each stream in turn, and
/// stops at the first error.
///
/// This `struct` is created by the [`try_round_robin`] method on the
/// [`TryRoundRobin`] trait. See its documentation for more.
///
/// [`try_round_robin`]: crate::stream::TryRoundRobin::try_round_robin
/// [`TryRoundRobin`]: crate::stream::TryRoundRobin
#[must_use = "streams do nothing unless polled or .awaited"]
#[pin_project(PinnedDrop)]
pub struct TryRoundRobin<S, T, E, const N: usize>
where
    S: Stream<Item = Result<T, E>>,
{
    #[pin]
    streams: Option<[S; N]>,
    items: [MaybeUninit<T>; N],
    filled: usize,
}

impl<S, T, E, const N: usize> TryRoundRobin<S, T, E, N>
where
    S: Stream<Item = Result<T, E>>,
{
    pub(crate) fn new(streams: [S; N]) -> Self {
        Self {
            streams: Some(streams),
            items: array::from_fn(|_| MaybeUninit::uninit()),
            filled: 0,
        }
    }
}

impl<S, T, E, const N: usize> fmt::Debug for TryRoundRobin<S, T, E, N>
where
    S: Stream<Item = Result<T, E>> + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.streams.iter().flatten()).finish()
    }
}

impl<S, T, E, const N: usize> Stream for TryRoundRobin<S, T, E, N>
where
    S: Stream<Item = Result<T, E>>,
{
    type Item = Result<[T; N], E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        let stop = loop {
            let Some(streams) = this.streams.as_mut().as_pin_mut() else {
                return Poll::Ready(None);
            };
            let index = *this.filled;
            let Some(stream) = utils::get_pin_mut(streams, index) else {
                if N == 0 {
                    break None;
                }
                *this.filled = 0;
                let items = mem::replace(this.items, array::from_fn(|_| MaybeUninit::uninit()));
                // SAFETY: the round completed, so every slot has been written.
                return Poll::Ready(Some(Ok(unsafe { utils::array_assume_init(items) })));
            };
            match stream.poll_next(cx) {
                Poll::Ready(Some(Ok(item))) => {
                    this.items[index].write(item);
                    *this.filled += 1;
                }
                Poll::Ready(Some(Err(err))) => break Some(err),
                Poll::Ready(None) => break None,
                Poll::Pending => return Poll::Pending,
            }
        };

        // SAFETY: exactly the first `filled` slots were written this round.
        unsafe { utils::drop_initialized(this.items, *this.filled) };
        *this.filled = 0;
        this.streams.set(None);
        Poll::Ready(stop.map(Err))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.streams {
            // Any source may still fail and end the merge early.
            Some(streams) => {
                let hints = streams.iter().map(Stream::size_hint);
                (0, utils::rounds_size_hint(hints, self.filled).1)
            }
            None => (0, Some(0)),
        }
    }
}

/// Drop the items of a round in progress on cancellation.
#[pinned_drop]
impl<S, T, E, const N: usize> PinnedDrop for TryRoundRobin<S, T, E, N>
where
    S: Stream<Item = Result<T, E>>,
{
    fn drop(self: Pin<&mut Self>) {
        let this = self.project();
        // SAFETY: `filled` tracks exactly which slots are initialized.
        unsafe { utils::drop_initialized(this.items, *this.filled) };
    }
}

impl<S, T, E, const N: usize> TryRoundRobinTrait for [S; N]
where
    S: IntoStream<Item = Result<T, E>>,
{
    type Ok = [T; N];
    type Error = E;
    type Stream = TryRoundRobin<S::IntoStream, T, E, N>;

    fn try_round_robin(self) -> Self::Stream {
        TryRoundRobin::new(self.map(IntoStream::into_stream))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures_lite::future::{block_on, yield_now};
    use futures_lite::prelude::*;
    use futures_lite::stream;

    #[test]
    fn all_ok() {
        block_on(async {
            let a = stream::iter([Ok::<_, String>(1), Ok(2)]);
            let b = stream::iter([Ok(10), Ok(20)]);
            let rounds: Vec<_> = [a, b].try_round_robin().collect().await;
            assert_eq!(rounds, [Ok([1, 10]), Ok([2, 20])]);
        })
    }

    #[test]
    fn error_after_suspension() {
        block_on(async {
            let flaky = stream::unfold(0, |n| async move {
                yield_now().await;
                match n {
                    0 => Some((Ok(n), n + 1)),
                    1 => Some((Err(format!("read {n} failed")), n + 1)),
                    _ => None,
                }
            });
            let steady = stream::unfold(100, |n| async move { Some((Ok(n), n + 1)) });
            let s = [flaky.boxed_local(), steady.boxed_local()].try_round_robin();
            let rounds: Vec<_> = s.collect().await;
            assert_eq!(rounds, [Ok([0, 100]), Err("read 1 failed".to_string())]);
        })
    }

    #[test]
    fn errors_lower_the_size_hint() {
        let a = stream::iter([Ok::<_, String>(1), Ok(2)]);
        let b = stream::iter([Ok(10), Ok(20), Ok(30)]);
        let s = [a.boxed_local(), b.boxed_local()].try_round_robin();
        assert_eq!(s.size_hint(), (0, Some(2)));
    }
}
