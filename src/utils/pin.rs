use core::pin::Pin;

/// Returns a pinned mutable reference to the element at `index`, or `None`
/// if the index is out of bounds.
///
/// Pinned counterpart of [`slice::get_mut`], restricted to single elements.
#[inline]
pub(crate) fn get_pin_mut<T>(slice: Pin<&mut [T]>, index: usize) -> Option<Pin<&mut T>> {
    // SAFETY: `get_mut` never moves elements out of the slice, and the
    // element inherits the pinning guarantee of the slice it lives in.
    unsafe {
        slice
            .get_unchecked_mut()
            .get_mut(index)
            .map(|t| Pin::new_unchecked(t))
    }
}

/// Same as [`get_pin_mut`], for a pinned `Vec`.
///
/// The vec itself is never resized through this reference, so its buffer
/// stays put for as long as the pin is held.
#[inline]
pub(crate) fn get_pin_mut_from_vec<T>(vec: Pin<&mut Vec<T>>, index: usize) -> Option<Pin<&mut T>> {
    // SAFETY: we only hand out a reference into the existing allocation and
    // never push to or shrink the vec while it is pinned.
    unsafe {
        vec.get_unchecked_mut()
            .get_mut(index)
            .map(|t| Pin::new_unchecked(t))
    }
}
