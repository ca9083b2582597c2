//! Utilities to implement the different futures and streams of this crate.

mod notifier;
mod pin;
mod size_hint;
mod uninit;

pub(crate) use notifier::Notifier;
pub(crate) use pin::{get_pin_mut, get_pin_mut_from_vec};
pub(crate) use size_hint::rounds_size_hint;
pub(crate) use uninit::{array_assume_init, drop_initialized};
