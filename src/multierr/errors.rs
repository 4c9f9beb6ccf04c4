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
use std::fmt::{Display, Formatter};

/// A non-empty collection of errors gathered from independent concurrent operations.
#[derive(Clone, Debug, Default)]
pub struct AggregatedError {
    errors: Vec<ViewError>,
}

impl AggregatedError {
    pub fn errors(&self) -> &[ViewError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ViewError> {
        self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn contains<P>(&self, predicate: P) -> bool
    where
        P: Fn(&ViewError) -> bool,
    {
        self.errors.iter().any(predicate)
    }
}

impl Display for AggregatedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.errors.as_slice() {
            [] => write!(f, "no errors"),
            [error] => write!(f, "{error}"),
            errors => {
                write!(f, "{} errors occurred:", errors.len())?;
                for error in errors {
                    write!(f, "\n\t* {error}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for AggregatedError {}

/// Collects errors, flattening nested aggregates.
#[derive(Debug, Default)]
pub struct Errors {
    errors: Vec<ViewError>,
}

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ViewError) {
        match error {
            ViewError::Aggregated(aggregated) => self.errors.extend(aggregated.into_errors()),
            error => self.errors.push(error),
        }
    }

    pub fn collect<T>(&mut self, result: Result<T, ViewError>) {
        if let Err(error) = result {
            self.push(error);
        }
    }

    pub fn merge(&mut self, other: Errors) {
        self.errors.extend(other.errors);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok` when nothing was collected, otherwise every collected error as one aggregate.
    pub fn into_result(self) -> Result<(), ViewError> {
        if self.errors.is_empty() {
            return Ok(());
        }

        Err(ViewError::Aggregated(AggregatedError {
            errors: self.errors,
        }))
    }
}
