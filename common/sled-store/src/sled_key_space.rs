// Copyright 2021 Beacon Labs.
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

use std::fmt::Debug;
use std::fmt::Display;
use std::ops::Bound;

use common_exception::ErrorCode;
use common_exception::Result;
use sled::IVec;

use crate::SledOrderedSerde;
use crate::SledSerde;

/// A key-value type stored in a sled tree.
///
/// Every key space lives under a distinct single-byte prefix, letting
/// several typed stores share one physical tree.
pub trait SledKeySpace {
    /// The prefix byte; must be unique within a tree and less than 0xFF.
    const PREFIX: u8;

    /// For logging.
    const NAME: &'static str;

    type K: SledOrderedSerde + Display + Debug;
    type V: SledSerde;

    fn serialize_key(k: &Self::K) -> Result<IVec> {
        let b = SledOrderedSerde::ser(k)?;
        let mut x = Vec::with_capacity(b.len() + 1);
        x.push(Self::PREFIX);
        x.extend_from_slice(&b);
        Ok(x.into())
    }

    fn deserialize_key<T: AsRef<[u8]>>(iv: T) -> Result<Self::K> {
        let b = iv.as_ref();
        if b.is_empty() || b[0] != Self::PREFIX {
            return Err(ErrorCode::BadBytes(format!(
                "key not in space {}",
                Self::NAME
            )));
        }
        SledOrderedSerde::de(&b[1..])
    }

    fn serialize_value(v: &Self::V) -> Result<IVec> {
        SledSerde::ser(v)
    }

    fn deserialize_value<T: AsRef<[u8]>>(iv: T) -> Result<Self::V> {
        SledSerde::de(iv)
    }

    /// Byte bounds spanning every key in this key space.
    fn span() -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
        (
            Bound::Included(vec![Self::PREFIX]),
            Bound::Excluded(vec![Self::PREFIX + 1]),
        )
    }
}
