//! String-like argument coercion.
//!
//! Every public entry point in this crate takes its textual parameters as `impl StringArg`, so
//! callers can pass `&str`, `String`, `Cow<str>`, numbers, timestamps or `None` interchangeably.
//! The conversion is picked at compile time from the argument type; shapes that do not implement
//! [`StringArg`] are rejected by the compiler.

use chrono::{DateTime, SecondsFormat, Utc};
use std::borrow::Cow;

/// A value that can be viewed as a request string.
///
/// Absent values (`None`) coerce to the empty string. Borrowed shapes never allocate.
pub trait StringArg {
    fn to_arg(&self) -> Cow<'_, str>;
}

impl StringArg for str {
    fn to_arg(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl StringArg for String {
    fn to_arg(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl StringArg for Box<str> {
    fn to_arg(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl StringArg for Cow<'_, str> {
    fn to_arg(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_ref())
    }
}

// Raw buffers are decoded lossily; valid UTF-8 is borrowed as is.
impl StringArg for [u8] {
    fn to_arg(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self)
    }
}

impl StringArg for Vec<u8> {
    fn to_arg(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self)
    }
}

impl<T: StringArg> StringArg for Option<T> {
    fn to_arg(&self) -> Cow<'_, str> {
        match self {
            Some(value) => value.to_arg(),
            None => Cow::Borrowed(""),
        }
    }
}

impl<T: StringArg + ?Sized> StringArg for &T {
    fn to_arg(&self) -> Cow<'_, str> {
        (**self).to_arg()
    }
}

/// Timestamps render as RFC3339 UTC ("Zulu") with up to nine fractional digits.
impl StringArg for DateTime<Utc> {
    fn to_arg(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

macro_rules! numeric_arg {
    ($($t:ty),*) => {
        $(
            impl StringArg for $t {
                fn to_arg(&self) -> Cow<'_, str> {
                    Cow::Owned(self.to_string())
                }
            }
        )*
    };
}

numeric_arg!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

/// Splits a comma separated list argument, trimming entries and dropping empty ones.
pub(crate) fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}
