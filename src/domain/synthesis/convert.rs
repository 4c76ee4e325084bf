// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Checked numeric conversions between declared `i64` values and the
//! fixed-width fields of the document. Out-of-range values are rejected,
//! never truncated.

use crate::shared::error::{ProvisionError, Result};

/// Fixed-width targets with a printable name for error messages.
pub trait Target: TryFrom<i64> + Copy {
    const NAME: &'static str;
}

impl Target for u8 {
    const NAME: &'static str = "u8";
}

impl Target for u16 {
    const NAME: &'static str = "u16";
}

impl Target for u32 {
    const NAME: &'static str = "u32";
}

impl Target for u64 {
    const NAME: &'static str = "u64";
}

/// Convert a required value.
pub fn checked<T: Target>(field: &str, value: i64) -> Result<T> {
    T::try_from(value).map_err(|_| ProvisionError::conversion(field, value, T::NAME))
}

/// Convert an optional value; `0` means "not set".
pub fn optional<T: Target>(field: &str, value: i64) -> Result<Option<T>> {
    if value == 0 {
        return Ok(None);
    }
    checked(field, value).map(Some)
}

/// Widen a document value back to its declared form; `None` reads as `0`.
pub fn widen<T: Into<i64>>(value: Option<T>) -> i64 {
    value.map(Into::into).unwrap_or(0)
}

/// Widen a `u64`, saturating values beyond `i64::MAX`.
pub fn widen_u64(value: Option<u64>) -> i64 {
    value
        .map(|v| i64::try_from(v).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
