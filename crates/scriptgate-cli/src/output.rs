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

//! Rendering of handler responses for the terminal.

use anyhow::Result;
use scriptgate_common::Response;
use serde_json::{Map, Value, json};
use std::io::Write;

/// How `scriptgate run` prints a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Status line, headers, a blank line, then the raw body.
    Text,
    /// One JSON object: `{"status": .., "headers": {..}, "body": ".."}`.
    Json,
}

/// Drains `response` and writes it to `out`.
pub fn write_response<W: Write>(out: &mut W, mut response: Response, format: Format) -> Result<()> {
    let body = response.body.read_all();

    match format {
        Format::Text => {
            writeln!(out, "Status: {}", response.status)?;
            for (name, value) in response.headers.iter() {
                writeln!(out, "{}: {}", name, value)?;
            }
            writeln!(out)?;
            out.write_all(&body)?;
        }
        Format::Json => {
            let headers: Map<String, Value> = response
                .headers
                .iter()
                .map(|(name, value)| (name.to_string(), Value::from(value)))
                .collect();
            let rendered = json!({
                "status": response.status,
                "headers": headers,
                "body": String::from_utf8_lossy(&body),
            });
            serde_json::to_writer(&mut *out, &rendered)?;
            writeln!(out)?;
        }
    }

    out.flush()?;
    Ok(())
}
