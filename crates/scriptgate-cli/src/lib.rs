// Copyright 2025 scriptgate Authors
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

//! # scriptgate CLI
//!
//! Command-line interface for exercising scriptgate handlers without a host
//! HTTP server.
//!
//! - `scriptgate run`: Push one request through the connector and print the
//!   response
//! - `scriptgate check`: Load handlers and report whether they would serve
//!
//! ## Architecture
//!
//! The CLI uses the `argh` crate for argument parsing and drives a
//! `scriptgate_server::Dispatcher` directly. Response rendering lives in
//! [`output`].

pub mod output;
