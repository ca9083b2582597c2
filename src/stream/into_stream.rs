use futures_core::Stream;

/// Conversion into a [`Stream`].
///
/// Lets the round-robin operators accept anything which can become a
/// stream, not only streams themselves.
pub trait IntoStream {
    /// The type of the elements being iterated over.
    type Item;

    /// The stream this value turns into.
    type IntoStream: Stream<Item = Self::Item>;

    /// Creates a stream from a value.
    fn into_stream(self) -> Self::IntoStream;
}

impl<S: Stream> IntoStream for S {
    type Item = S::Item;
    type IntoStream = S;

    #[inline]
    fn into_stream(self) -> S {
        self
    }
}
