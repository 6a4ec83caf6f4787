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

use byteorder::BigEndian;
use byteorder::ByteOrder;
use common_exception::ErrorCode;
use common_exception::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::IVec;

/// Serialize/deserialize sled values. Values do not need an
/// order-preserving encoding, thus anything serde can handle will do.
pub trait SledSerde: Serialize + DeserializeOwned {
    fn ser(&self) -> Result<IVec> {
        let x = serde_json::to_vec(self)?;
        Ok(x.into())
    }

    fn de<T: AsRef<[u8]>>(v: T) -> Result<Self>
    where Self: Sized {
        let s = serde_json::from_slice(v.as_ref())?;
        Ok(s)
    }
}

impl<T> SledSerde for T where T: Serialize + DeserializeOwned {}

/// Serialize/deserialize sled keys. The byte encoding must preserve the
/// ordering of the native type so that range scans behave.
pub trait SledOrderedSerde {
    fn ser(&self) -> Result<IVec>;

    fn de<V: AsRef<[u8]>>(v: V) -> Result<Self>
    where Self: Sized;
}

/// u64 keys are encoded big-endian.
impl SledOrderedSerde for u64 {
    fn ser(&self) -> Result<IVec> {
        let size = std::mem::size_of::<u64>();
        let mut buf = vec![0; size];
        BigEndian::write_u64(&mut buf, *self);
        Ok(buf.into())
    }

    fn de<V: AsRef<[u8]>>(v: V) -> Result<Self>
    where Self: Sized {
        let b = v.as_ref();
        if b.len() != std::mem::size_of::<u64>() {
            return Err(ErrorCode::BadBytes("not a u64 key"));
        }
        Ok(BigEndian::read_u64(b))
    }
}

/// String keys keep their natural lexicographic order.
impl SledOrderedSerde for String {
    fn ser(&self) -> Result<IVec> {
        Ok(IVec::from(self.as_str()))
    }

    fn de<V: AsRef<[u8]>>(v: V) -> Result<Self>
    where Self: Sized {
        Ok(String::from_utf8(v.as_ref().to_vec())?)
    }
}
