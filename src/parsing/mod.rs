// Copyright 2025 Lablup Inc. and Jeongkyu Shin
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

//! Value normalization for `nvidia-smi` string fields.
//!
//! Every function here is pure and total: a field that cannot be interpreted
//! becomes `"0"` instead of an error, so one odd reading never costs a scrape.

pub mod float_format;
pub mod normalize;

pub use normalize::{filter_number, filter_unit, filter_version, UnitMagnitude, UnitPrefix};
