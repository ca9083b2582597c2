use super::RoundRobin as RoundRobinTrait;
use crate::stream::IntoStream;
use crate::utils;

use core::fmt;
use core::mem::{self, MaybeUninit};
use core::pin::Pin;
use core::task::{Context, Poll};

use futures_core::Stream;
use pin_project::{pin_project, pinned_drop};

macro_rules! impl_round_robin_tuple {
    ($mod_name:ident $StructName:ident $($F:ident=$idx:tt)+) => {
        mod $mod_name {
            #[pin_project::pin_project]
            pub(super) struct Streams<$($F,)+> { $(#[pin] pub(super) $F: $F),+ }
        }

        /// A stream which pulls one item from each stream in turn and yields
        /// them together as a tuple.
        ///
        /// This `struct` is created by the [`round_robin`] method on the
        /// [`RoundRobin`] trait. See its documentation for more.
        ///
        /// [`round_robin`]: crate::stream::RoundRobin::round_robin
        /// [`RoundRobin`]: crate::stream::RoundRobin
        #[must_use = "streams do nothing unless polled or .awaited"]
        #[pin_project(PinnedDrop)]
        pub struct $StructName<$($F),+>
        where $(
            $F: Stream,
        )+ {
            #[pin]
            streams: Option<$mod_name::Streams<$($F,)+>>,
            items: ($(MaybeUninit<$F::Item>,)+),
            filled: usize,
        }

        impl<$($F),+> fmt::Debug for $StructName<$($F),+>
        where $(
            $F: Stream + fmt::Debug,
        )+ {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let mut tuple = f.debug_tuple("RoundRobin");
                if let Some(streams) = &self.streams {
                    $( tuple.field(&streams.$F); )+
                }
                tuple.finish()
            }
        }

        impl<$($F),+> Stream for $StructName<$($F),+>
        where $(
            $F: Stream,
        )+ {
            type Item = ($($F::Item,)+);

            fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
                let mut this = self.project();

                let exhausted = 'round: {
                    let Some(streams) = this.streams.as_mut().as_pin_mut() else {
                        return Poll::Ready(None);
                    };
                    let streams = streams.project();
                    $(
                        if *this.filled == $idx {
                            match streams.$F.poll_next(cx) {
                                Poll::Ready(Some(item)) => {
                                    this.items.$idx.write(item);
                                    *this.filled += 1;
                                }
                                Poll::Ready(None) => break 'round true,
                                Poll::Pending => return Poll::Pending,
                            }
                        }
                    )+
                    false
                };

                if exhausted {
                    $(
                        if $idx < *this.filled {
                            // SAFETY: slots below `filled` were written this round.
                            unsafe { this.items.$idx.assume_init_drop() };
                        }
                    )+
                    *this.filled = 0;
                    this.streams.set(None);
                    return Poll::Ready(None);
                }

                *this.filled = 0;
                let items = mem::replace(this.items, ($(MaybeUninit::<$F::Item>::uninit(),)+));
                // SAFETY: the round completed, so every slot has been written.
                Poll::Ready(Some(unsafe { ($(items.$idx.assume_init(),)+) }))
            }

            fn size_hint(&self) -> (usize, Option<usize>) {
                match &self.streams {
                    Some(streams) => {
                        utils::rounds_size_hint([$(streams.$F.size_hint()),+], self.filled)
                    }
                    None => (0, Some(0)),
                }
            }
        }

        #[pinned_drop]
        impl<$($F),+> PinnedDrop for $StructName<$($F),+>
        where $(
            $F: Stream,
        )+ {
            fn drop(self: Pin<&mut Self>) {
                let this = self.project();
                $(
                    if $idx < *this.filled {
                        // SAFETY: slots below `filled` are initialized.
                        unsafe { this.items.$idx.assume_init_drop() };
                    }
                )+
            }
        }

        impl<$($F),+> RoundRobinTrait for ($($F,)+)
        where $(
            $F: IntoStream,
        )+ {
            type Item = ($($F::Item,)+);
            type Stream = $StructName<$($F::IntoStream),+>;

            fn round_robin(self) -> Self::Stream {
                let ($($F,)+): ($($F,)+) = self;
                $StructName {
                    streams: Some($mod_name::Streams { $($F: $F.into_stream()),+ }),
                    items: ($(MaybeUninit::<$F::Item>::uninit(),)+),
                    filled: 0,
                }
            }
        }
    };
}

impl_round_robin_tuple! { round_robin1 RoundRobin1 A=0 }
impl_round_robin_tuple! { round_robin2 RoundRobin2 A=0 B=1 }
impl_round_robin_tuple! { round_robin3 RoundRobin3 A=0 B=1 C=2 }
impl_round_robin_tuple! { round_robin4 RoundRobin4 A=0 B=1 C=2 D=3 }
impl_round_robin_tuple! { round_robin5 RoundRobin5 A=0 B=1 C=2 D=3 E=4 }
impl_round_robin_tuple! { round_robin6 RoundRobin6 A=0 B=1 C=2 D=3 E=4 F=5 }
impl_round_robin_tuple! { round_robin7 RoundRobin7 A=0 B=1 C=2 D=3 E=4 F=5 G=6 }
impl_round_robin_tuple! { round_robin8 RoundRobin8 A=0 B=1 C=2 D=3 E=4 F=5 G=6 H=7 }
impl_round_robin_tuple! { round_robin9 RoundRobin9 A=0 B=1 C=2 D=3 E=4 F=5 G=6 H=7 I=8 }
impl_round_robin_tuple! { round_robin10 RoundRobin10 A=0 B=1 C=2 D=3 E=4 F=5 G=6 H=7 I=8 J=9 }
impl_round_robin_tuple! { round_robin11 RoundRobin11 A=0 B=1 C=2 D=3 E=4 F=5 G=6 H=7 I=8 J=9 K=10 }
impl_round_robin_tuple! { round_robin12 RoundRobin12 A=0 B=1 C=2 D=3 E=4 F=5 G=6 H=7 I=8 J=9 K=10 L=11 }
