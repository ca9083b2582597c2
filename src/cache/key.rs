use core::fmt;
use core::hash::{Hash, Hasher};

use super::error::{ArgPosition, KeyError};

/// A single argument value inside a [`CacheKey`].
///
/// Signed and unsigned integers of equal value are the same key, as are
/// `0.0` and `-0.0`. `NaN` is rejected since it never equals itself.
#[derive(Debug, Clone)]
pub enum KeyValue {
    /// The unit value, `()`.
    Unit,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// An unsigned integer too large for [`KeyValue::Int`].
    UInt(u64),
    /// A floating point number.
    Float(f64),
    /// A string.
    Str(String),
    /// A byte string.
    Bytes(Vec<u8>),
    /// An ordered group of values.
    Tuple(Vec<KeyValue>),
}

impl KeyValue {
    /// Bring the value into its canonical form, or explain why it has none.
    fn normalize(self) -> Result<Self, &'static str> {
        Ok(match self {
            KeyValue::UInt(n) => match i64::try_from(n) {
                Ok(n) => KeyValue::Int(n),
                Err(_) => KeyValue::UInt(n),
            },
            KeyValue::Float(n) if n.is_nan() => return Err("NaN is never equal to itself"),
            KeyValue::Float(n) if n == 0.0 => KeyValue::Float(0.0),
            KeyValue::Tuple(items) => KeyValue::Tuple(
                items
                    .into_iter()
                    .map(KeyValue::normalize)
                    .collect::<Result<_, _>>()?,
            ),
            other => other,
        })
    }
}

impl PartialEq for KeyValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (KeyValue::Unit, KeyValue::Unit) => true,
            (KeyValue::Bool(a), KeyValue::Bool(b)) => a == b,
            (KeyValue::Int(a), KeyValue::Int(b)) => a == b,
            (KeyValue::UInt(a), KeyValue::UInt(b)) => a == b,
            (KeyValue::Float(a), KeyValue::Float(b)) => a.to_bits() == b.to_bits(),
            (KeyValue::Str(a), KeyValue::Str(b)) => a == b,
            (KeyValue::Bytes(a), KeyValue::Bytes(b)) => a == b,
            (KeyValue::Tuple(a), KeyValue::Tuple(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for KeyValue {}

impl Hash for KeyValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            KeyValue::Unit => {}
            KeyValue::Bool(b) => b.hash(state),
            KeyValue::Int(n) => n.hash(state),
            KeyValue::UInt(n) => n.hash(state),
            KeyValue::Float(n) => n.to_bits().hash(state),
            KeyValue::Str(s) => s.hash(state),
            KeyValue::Bytes(b) => b.hash(state),
            KeyValue::Tuple(items) => items.hash(state),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Unit => f.write_str("()"),
            KeyValue::Bool(b) => write!(f, "{b}"),
            KeyValue::Int(n) => write!(f, "{n}"),
            KeyValue::UInt(n) => write!(f, "{n}"),
            KeyValue::Float(n) => write!(f, "{n:?}"),
            KeyValue::Str(s) => write!(f, "{s:?}"),
            KeyValue::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
            KeyValue::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
        }
    }
}

macro_rules! impl_from_int {
    ($variant:ident: $wide:ty => $($ty:ty),+) => {
        $(
            impl From<$ty> for KeyValue {
                fn from(n: $ty) -> Self {
                    KeyValue::$variant(n as $wide)
                }
            }
        )+
    };
}

impl_from_int!(Int: i64 => i8, i16, i32, i64, isize);
impl_from_int!(UInt: u64 => u8, u16, u32, u64, usize);

impl From<()> for KeyValue {
    fn from(_: ()) -> Self {
        KeyValue::Unit
    }
}

impl From<bool> for KeyValue {
    fn from(b: bool) -> Self {
        KeyValue::Bool(b)
    }
}

impl From<f32> for KeyValue {
    fn from(n: f32) -> Self {
        KeyValue::Float(n.into())
    }
}

impl From<f64> for KeyValue {
    fn from(n: f64) -> Self {
        KeyValue::Float(n)
    }
}

impl From<&str> for KeyValue {
    fn from(s: &str) -> Self {
        KeyValue::Str(s.to_owned())
    }
}

impl From<String> for KeyValue {
    fn from(s: String) -> Self {
        KeyValue::Str(s)
    }
}

impl From<&[u8]> for KeyValue {
    fn from(b: &[u8]) -> Self {
        KeyValue::Bytes(b.to_vec())
    }
}

impl<T: Into<KeyValue>> From<Option<T>> for KeyValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(KeyValue::Unit, Into::into)
    }
}

/// The identity of one logical call: its positional and keyword arguments.
///
/// Keyword arguments are kept sorted by name, so two calls passing the same
/// keywords in a different order produce the same key.
///
/// # Examples
///
/// ```
/// use futures_functools::cache::CacheKey;
///
/// let a = CacheKey::builder().arg("users").kwarg("limit", 10).kwarg("page", 2).build()?;
/// let b = CacheKey::builder().arg("users").kwarg("page", 2).kwarg("limit", 10u8).build()?;
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), r#"("users", limit=10, page=2)"#);
/// # Ok::<(), futures_functools::cache::KeyError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    args: Vec<KeyValue>,
    kwargs: Vec<(String, KeyValue)>,
}

impl CacheKey {
    /// Start building a key.
    pub fn builder() -> CacheKeyBuilder {
        CacheKeyBuilder::default()
    }

    /// The positional arguments, in call order.
    pub fn args(&self) -> &[KeyValue] {
        &self.args
    }

    /// The keyword arguments, sorted by name.
    pub fn kwargs(&self) -> impl Iterator<Item = (&str, &KeyValue)> {
        self.kwargs.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        let args = self.args.iter().map(|value| (None, value));
        let kwargs = self.kwargs.iter().map(|(name, value)| (Some(name), value));
        for (i, (name, value)) in args.chain(kwargs).enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match name {
                Some(name) => write!(f, "{name}={value}")?,
                None => write!(f, "{value}")?,
            }
        }
        f.write_str(")")
    }
}

/// Builder for [`CacheKey`].
#[derive(Debug, Clone, Default)]
pub struct CacheKeyBuilder {
    args: Vec<KeyValue>,
    kwargs: Vec<(String, KeyValue)>,
}

impl CacheKeyBuilder {
    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<KeyValue>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Add a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<KeyValue>) -> Self {
        self.kwargs.push((name.into(), value.into()));
        self
    }

    /// Validate the arguments and produce the key.
    pub fn build(self) -> Result<CacheKey, KeyError> {
        let args = self
            .args
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                value.normalize().map_err(|reason| KeyError::Unhashable {
                    position: ArgPosition::Positional(index),
                    reason,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut kwargs = self
            .kwargs
            .into_iter()
            .map(|(name, value)| match value.normalize() {
                Ok(value) => Ok((name, value)),
                Err(reason) => Err(KeyError::Unhashable {
                    position: ArgPosition::Keyword(name),
                    reason,
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        kwargs.sort_by(|(a, _), (b, _)| a.cmp(b));
        if let Some(pair) = kwargs.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(KeyError::DuplicateKeyword(pair[0].0.clone()));
        }

        Ok(CacheKey { args, kwargs })
    }
}
