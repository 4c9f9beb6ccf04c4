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

//! Concurrency primitives shared by the view: a task group that cancels on the
//! first failure but still collects every error, and a one-shot barrier that
//! fires once all partitions have caught up.

mod errgroup;
mod errors;
mod multiwait;

pub use errgroup::ErrGroup;
pub use errors::{AggregatedError, Errors};
pub use multiwait::{CatchupSignal, MultiWait};
