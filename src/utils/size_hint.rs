/// The number of rounds left, given the hints of every source in order.
///
/// The first `filled` sources already gave up their item for the round in
/// progress, so each of them counts one extra. With no sources there are no
/// rounds.
pub(crate) fn rounds_size_hint<I>(hints: I, filled: usize) -> (usize, Option<usize>)
where
    I: IntoIterator<Item = (usize, Option<usize>)>,
{
    hints
        .into_iter()
        .enumerate()
        .map(|(index, (low, high))| {
            let pulled = usize::from(index < filled);
            (
                low.saturating_add(pulled),
                high.and_then(|high| high.checked_add(pulled)),
            )
        })
        .reduce(|(low_a, high_a), (low_b, high_b)| {
            let high = match (high_a, high_b) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            (low_a.min(low_b), high)
        })
        .unwrap_or((0, Some(0)))
}
