use core::mem::{self, MaybeUninit};

/// Reads the values out of an array of `MaybeUninit` slots.
///
/// # Safety
///
/// Every slot of `array` must be initialized.
///
/// Stable stand-in for the unstable `MaybeUninit::array_assume_init`.
pub(crate) unsafe fn array_assume_init<T, const N: usize>(array: [MaybeUninit<T>; N]) -> [T; N] {
    // SAFETY: the caller vouches for every slot, `MaybeUninit<T>` has the
    // same layout as `T`, and `MaybeUninit` never drops its contents so the
    // `forget` below cannot cause a double free.
    let out = unsafe { (&array as *const [MaybeUninit<T>; N] as *const [T; N]).read() };
    mem::forget(array);
    out
}

/// Drops the first `filled` slots of `slots` in place.
///
/// # Safety
///
/// The first `filled` slots must be initialized, and must not be read again
/// afterwards.
pub(crate) unsafe fn drop_initialized<T>(slots: &mut [MaybeUninit<T>], filled: usize) {
    for slot in &mut slots[..filled] {
        // SAFETY: guaranteed by the caller.
        unsafe { slot.assume_init_drop() };
    }
}
