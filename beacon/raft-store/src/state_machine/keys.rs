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

//! Byte layout of the registry column family.
//!
//! Keys are single-byte prefix tags concatenated with sub-tags and an
//! 8-byte big-endian id or a raw name:
//!
//! ```text
//! 0x01 0x01 0x02            max_app_id          (value: i64 BE)
//! 0x01 0x01 0x09            max_zone_id
//! 0x01 0x01 0x0A            max_servlet_id
//! 0x01 0x02 <id:8>          AppMeta
//! 0x01 0x09 <id:8>          ZoneMeta
//! 0x01 0x0A <id:8>          ServletMeta
//! 0x02 <username>           UserPrivilege
//! 0x03 0x01 0x03            max_instance_id
//! 0x03 0x03 <address>       InstanceMeta
//! 0x04 "max_config_id"      max_config_id
//! 0x04 0x02 <id:8>          ConfigMeta          (content sub-byte: 0x02)
//! ```

use byteorder::BigEndian;
use byteorder::ByteOrder;
use common_exception::ErrorCode;
use common_exception::Result;

pub const SCHEMA_IDENTIFY: u8 = 0x01;
pub const MAX_ID_IDENTIFY: u8 = 0x01;
pub const APP_IDENTIFY: u8 = 0x02;
pub const ZONE_IDENTIFY: u8 = 0x09;
pub const SERVLET_IDENTIFY: u8 = 0x0A;

pub const PRIVILEGE_IDENTIFY: u8 = 0x02;

pub const DISCOVERY_IDENTIFY: u8 = 0x03;
pub const DISCOVERY_MAX_ID_IDENTIFY: u8 = 0x01;
pub const INSTANCE_IDENTIFY: u8 = 0x03;

pub const CONFIG_IDENTIFY: u8 = 0x04;
pub const CONFIG_CONTENT_IDENTIFY: u8 = 0x02;

pub const MAX_CONFIG_ID_KEY: &[u8] = b"max_config_id";

fn id_bytes(id: i64) -> [u8; 8] {
    let mut b = [0u8; 8];
    BigEndian::write_i64(&mut b, id);
    b
}

pub fn i64_value(v: i64) -> Vec<u8> {
    id_bytes(v).to_vec()
}

pub fn parse_i64(b: &[u8]) -> Result<i64> {
    if b.len() != 8 {
        return Err(ErrorCode::BadBytes("not an i64 value"));
    }
    Ok(BigEndian::read_i64(b))
}

fn schema_key(tag: u8, id: i64) -> Vec<u8> {
    let mut k = vec![SCHEMA_IDENTIFY, tag];
    k.extend_from_slice(&id_bytes(id));
    k
}

fn schema_max_id_key(tag: u8) -> Vec<u8> {
    vec![SCHEMA_IDENTIFY, MAX_ID_IDENTIFY, tag]
}

pub fn app_key(id: i64) -> Vec<u8> {
    schema_key(APP_IDENTIFY, id)
}

pub fn zone_key(id: i64) -> Vec<u8> {
    schema_key(ZONE_IDENTIFY, id)
}

pub fn servlet_key(id: i64) -> Vec<u8> {
    schema_key(SERVLET_IDENTIFY, id)
}

pub fn max_app_id_key() -> Vec<u8> {
    schema_max_id_key(APP_IDENTIFY)
}

pub fn max_zone_id_key() -> Vec<u8> {
    schema_max_id_key(ZONE_IDENTIFY)
}

pub fn max_servlet_id_key() -> Vec<u8> {
    schema_max_id_key(SERVLET_IDENTIFY)
}

pub fn user_key(username: &str) -> Vec<u8> {
    let mut k = vec![PRIVILEGE_IDENTIFY];
    k.extend_from_slice(username.as_bytes());
    k
}

pub fn instance_key(address: &str) -> Vec<u8> {
    let mut k = vec![DISCOVERY_IDENTIFY, INSTANCE_IDENTIFY];
    k.extend_from_slice(address.as_bytes());
    k
}

pub fn max_instance_id_key() -> Vec<u8> {
    vec![
        DISCOVERY_IDENTIFY,
        DISCOVERY_MAX_ID_IDENTIFY,
        INSTANCE_IDENTIFY,
    ]
}

pub fn config_key(id: i64) -> Vec<u8> {
    let mut k = vec![CONFIG_IDENTIFY, CONFIG_CONTENT_IDENTIFY];
    k.extend_from_slice(&id_bytes(id));
    k
}

pub fn max_config_id_key() -> Vec<u8> {
    let mut k = vec![CONFIG_IDENTIFY];
    k.extend_from_slice(MAX_CONFIG_ID_KEY);
    k
}

pub fn app_prefix() -> Vec<u8> {
    vec![SCHEMA_IDENTIFY, APP_IDENTIFY]
}

pub fn zone_prefix() -> Vec<u8> {
    vec![SCHEMA_IDENTIFY, ZONE_IDENTIFY]
}

pub fn servlet_prefix() -> Vec<u8> {
    vec![SCHEMA_IDENTIFY, SERVLET_IDENTIFY]
}

pub fn user_prefix() -> Vec<u8> {
    vec![PRIVILEGE_IDENTIFY]
}

pub fn instance_prefix() -> Vec<u8> {
    vec![DISCOVERY_IDENTIFY, INSTANCE_IDENTIFY]
}

pub fn config_prefix() -> Vec<u8> {
    vec![CONFIG_IDENTIFY, CONFIG_CONTENT_IDENTIFY]
}
