// Copyright 2025 eraflo
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

use serde::{Deserialize, Serialize};
use std::fmt;

/// A content-addressed identifier for a resource.
///
/// The hash is derived from the resource bytes, so identical content always maps
/// to the same key and stays stable across runs. It is the primary key in every
/// registry table and derived list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceHash(pub u128);

impl ResourceHash {
    /// Builds a hash from two 64-bit halves.
    pub const fn from_parts(low: u64, high: u64) -> Self {
        Self(((high as u128) << 64) | low as u128)
    }

    /// Derives the hash of a byte buffer.
    ///
    /// Uses the first 128 bits of the BLAKE3 digest of `bytes`.
    pub fn from_content(bytes: &[u8]) -> Self {
        let digest = blake3::hash(bytes);
        let mut truncated = [0u8; 16];
        truncated.copy_from_slice(&digest.as_bytes()[..16]);
        Self(u128::from_le_bytes(truncated))
    }

    /// The low 64 bits of the hash.
    pub const fn low(&self) -> u64 {
        self.0 as u64
    }

    /// The high 64 bits of the hash.
    pub const fn high(&self) -> u64 {
        (self.0 >> 64) as u64
    }
}

impl fmt::Display for ResourceHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}:{:016x}", self.high(), self.low())
    }
}

/// Identifies an independent consumer of resources.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SceneId(pub u64);

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene#{}", self.0)
    }
}

/// The device-side identity of an uploaded resource.
///
/// Handles are opaque to the lifecycle manager; it only stores them and gives
/// them back to the device when the resource is unloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceHandle(pub u64);

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_parts_round_trip() {
        let hash = ResourceHash::from_parts(1234, 7);
        assert_eq!(hash.low(), 1234);
        assert_eq!(hash.high(), 7);
    }

    #[test]
    fn test_content_hash_is_stable_and_content_sensitive() {
        let a = ResourceHash::from_content(b"vertex data");
        let b = ResourceHash::from_content(b"vertex data");
        let c = ResourceHash::from_content(b"index data");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_hash_display_is_zero_padded_hex() {
        let hash = ResourceHash::from_parts(0xab, 0x1);
        assert_eq!(hash.to_string(), "0000000000000001:00000000000000ab");
    }
}
