/* Licensed to the Apache Software Foundation (ASF) under one
 * or more contributor license agreements.  See the NOTICE file
 * distributed with this work for additional information
 * regarding copyright ownership.  The ASF licenses this file
 * to you under the Apache License, Version 2.0 (the
 * "License"); you may not use this file except in compliance
 * with the License.  You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing,
 * software distributed under the License is distributed on an
 * "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
 * KIND, either express or implied.  See the License for the
 * specific language governing permissions and limitations
 * under the License.
 */

use crate::error::ViewError;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Converts between the bytes stored in the table and the view's domain values.
pub trait Codec: Send + Sync + 'static {
    type Value: Send + 'static;

    fn encode(&self, value: &Self::Value) -> Result<Bytes, ViewError>;
    fn decode(&self, data: &[u8]) -> Result<Self::Value, ViewError>;
}

/// Passes raw bytes through.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl Codec for BytesCodec {
    type Value = Bytes;

    fn encode(&self, value: &Bytes) -> Result<Bytes, ViewError> {
        Ok(value.clone())
    }

    fn decode(&self, data: &[u8]) -> Result<Bytes, ViewError> {
        Ok(Bytes::copy_from_slice(data))
    }
}

/// UTF-8 strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl Codec for StringCodec {
    type Value = String;

    fn encode(&self, value: &String) -> Result<Bytes, ViewError> {
        Ok(Bytes::copy_from_slice(value.as_bytes()))
    }

    fn decode(&self, data: &[u8]) -> Result<String, ViewError> {
        std::str::from_utf8(data)
            .map(ToOwned::to_owned)
            .map_err(|error| ViewError::Decode(error.to_string()))
    }
}

/// JSON documents mapped onto `T` with serde.
#[derive(Debug)]
pub struct JsonCodec<T> {
    _value: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _value: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> Codec for JsonCodec<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    type Value = T;

    fn encode(&self, value: &T) -> Result<Bytes, ViewError> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|error| ViewError::Encode(error.to_string()))
    }

    fn decode(&self, data: &[u8]) -> Result<T, ViewError> {
        serde_json::from_slice(data).map_err(|error| ViewError::Decode(error.to_string()))
    }
}
