/*!
 * Small Strings
 *
 * Error details and process names are short ("options must be 0",
 * "/testbin/argtest") and get built on every failed syscall and every
 * exec. `InlineString` keeps anything up to 23 bytes inside the value, so
 * those paths do not touch the allocator. Longer text spills to the heap.
 */

use serde::{Deserialize, Serialize};
use smartstring::alias::String as SmartString;
use std::fmt;
use std::ops::Deref;

/// Owned string stored inline when short
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InlineString(SmartString);

impl InlineString {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the text lives inside the value rather than on the heap
    #[inline]
    pub fn is_inline(&self) -> bool {
        self.0.is_inline()
    }
}

impl From<&str> for InlineString {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl From<String> for InlineString {
    fn from(s: String) -> Self {
        Self(s.into())
    }
}

impl From<InlineString> for String {
    fn from(s: InlineString) -> Self {
        s.0.into()
    }
}

impl Deref for InlineString {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for InlineString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InlineString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
