//! JavaScript -> Response Conversions
//!
//! A script's `run(env)` returns a three element array:
//!
//! ```text
//! [status, headers, body]
//! ```
//!
//! # Type Mapping
//!
//! | Element | JavaScript | Rust |
//! |---------|------------|------|
//! | status | integral Number in 100..=999 | `u16` |
//! | headers | plain Object, `undefined` or `null` | `Headers` (values stringified) |
//! | body | String, `Uint8Array`, Array, iterator/iterable, `undefined` or `null` | `Body` |
//!
//! A `Uint8Array`, whether it is the body or one of its chunks, is taken as
//! raw bytes. Strings are encoded as UTF-8. Any other body value is
//! stringified into a single chunk.
//!
//! # Limitations
//!
//! - The body is drained on the script's worker thread before the response is
//!   handed back, because Boa values cannot leave the thread that owns them
//! - Symbol keys on the headers object are skipped

use boa_engine::{
    Context, JsSymbol, js_string,
    object::{
        JsObject,
        builtins::{JsArray, JsUint8Array},
    },
    property::PropertyKey,
    value::JsValue,
};
use scriptgate_common::{Body, Chunk, GatewayError, Headers, Response, Result};

/// Convert the value returned by `run` into a [`Response`].
///
/// # Errors
///
/// Returns `GatewayError::Handler` if the value is not an array, the status
/// is not an integral number in `100..=999`, or reading the headers or body
/// throws.
pub fn js_to_response(value: JsValue, ctx: &mut Context) -> Result<Response> {
    let triple = value
        .as_object()
        .filter(|o| o.is_array())
        .ok_or_else(|| GatewayError::Handler("run() must return [status, headers, body]".into()))?;
    let triple = JsArray::from_object(triple.clone())
        .map_err(|e| GatewayError::Handler(format!("Invalid response array: {}", e)))?;

    let status = triple
        .get(0_usize, ctx)
        .map_err(|e| GatewayError::Handler(format!("Failed to read status: {}", e)))?;
    let status = js_to_status(&status, ctx)?;

    let headers = triple
        .get(1_usize, ctx)
        .map_err(|e| GatewayError::Handler(format!("Failed to read headers: {}", e)))?;
    let headers = js_to_headers(&headers, ctx)?;

    let body = triple
        .get(2_usize, ctx)
        .map_err(|e| GatewayError::Handler(format!("Failed to read body: {}", e)))?;
    let body = js_to_chunks(&body, ctx)?;

    Ok(Response::new(status, headers, Body::from_chunks(body)))
}

fn js_to_status(value: &JsValue, ctx: &mut Context) -> Result<u16> {
    let n = value
        .to_number(ctx)
        .map_err(|e| GatewayError::Handler(format!("Invalid status: {}", e)))?;
    if n.fract() != 0.0 || !(100.0..=999.0).contains(&n) {
        return Err(GatewayError::Handler(format!("Invalid status code: {}", n)));
    }
    Ok(n as u16)
}

fn js_to_headers(value: &JsValue, ctx: &mut Context) -> Result<Headers> {
    let mut headers = Headers::new();
    if value.is_undefined() || value.is_null() {
        return Ok(headers);
    }

    let obj = value
        .as_object()
        .ok_or_else(|| GatewayError::Handler("headers must be an object".into()))?;

    let keys = obj
        .own_property_keys(ctx)
        .map_err(|e| GatewayError::Handler(format!("Failed to get header names: {}", e)))?;

    for key in keys {
        let name = match &key {
            PropertyKey::String(s) => s.to_std_string_escaped(),
            PropertyKey::Index(i) => i.get().to_string(),
            PropertyKey::Symbol(_) => continue,
        };
        let value = obj
            .get(key.clone(), ctx)
            .and_then(|v| v.to_string(ctx))
            .map_err(|e| GatewayError::Handler(format!("Failed to read header '{}': {}", name, e)))?;
        headers.insert(name, value.to_std_string_escaped());
    }

    Ok(headers)
}

/// Drain a body value into chunks.
pub fn js_to_chunks(value: &JsValue, ctx: &mut Context) -> Result<Vec<Chunk>> {
    if value.is_undefined() || value.is_null() {
        return Ok(Vec::new());
    }

    if value.is_string() {
        return Ok(vec![js_to_chunk(value, ctx)?]);
    }

    if let Some(obj) = value.as_object() {
        if let Some(bytes) = uint8_bytes(&obj, ctx) {
            return Ok(vec![bytes]);
        }

        if obj.is_array() {
            let array = JsArray::from_object(obj.clone())
                .map_err(|e| GatewayError::Handler(format!("Invalid body array: {}", e)))?;
            let length: usize = array
                .length(ctx)
                .map_err(|e| GatewayError::Handler(format!("Failed to get body length: {}", e)))?
                .try_into()
                .map_err(|_| GatewayError::Handler("Body array length overflow".into()))?;

            let mut chunks = Vec::with_capacity(length);
            for i in 0..length {
                let elem = array
                    .get(i, ctx)
                    .map_err(|e| GatewayError::Handler(format!("Failed to get body chunk {}: {}", i, e)))?;
                chunks.push(js_to_chunk(&elem, ctx)?);
            }
            return Ok(chunks);
        }

        if let Some(iterator) = iterator_of(&obj.clone(), ctx)? {
            return drain_iterator(&iterator, ctx);
        }
    }

    Ok(vec![js_to_chunk(value, ctx)?])
}

fn js_to_chunk(value: &JsValue, ctx: &mut Context) -> Result<Chunk> {
    if let Some(bytes) = value.as_object().and_then(|obj| uint8_bytes(&obj, ctx)) {
        return Ok(bytes);
    }

    let s = value
        .to_string(ctx)
        .map_err(|e| GatewayError::Handler(format!("Failed to stringify body chunk: {}", e)))?;
    Ok(s.to_std_string_escaped().into_bytes())
}

fn uint8_bytes(obj: &JsObject, ctx: &mut Context) -> Option<Chunk> {
    let array = JsUint8Array::from_object(obj.clone()).ok()?;
    Some(array.iter(ctx).collect())
}

/// Returns the iterator for `obj`: the object itself when it has a callable
/// `next`, else whatever its `Symbol.iterator` method produces.
fn iterator_of(obj: &JsObject, ctx: &mut Context) -> Result<Option<JsObject>> {
    let next = obj
        .get(js_string!("next"), ctx)
        .map_err(|e| GatewayError::Handler(e.to_string()))?;
    if next.as_object().is_some_and(|n| n.is_callable()) {
        return Ok(Some(obj.clone()));
    }

    let factory = obj
        .get(JsSymbol::iterator(), ctx)
        .map_err(|e| GatewayError::Handler(e.to_string()))?;
    let Some(factory) = factory.as_object().filter(|f| f.is_callable()) else {
        return Ok(None);
    };

    let iterator = factory
        .call(&obj.clone().into(), &[], ctx)
        .map_err(|e| GatewayError::Handler(format!("Body iterator failed: {}", e)))?;
    Ok(iterator.as_object().map(|o| o.clone()))
}

fn drain_iterator(iterator: &JsObject, ctx: &mut Context) -> Result<Vec<Chunk>> {
    let next = iterator
        .get(js_string!("next"), ctx)
        .map_err(|e| GatewayError::Handler(e.to_string()))?;
    let next = next
        .as_object()
        .filter(|n| n.is_callable())
        .ok_or_else(|| GatewayError::Handler("body iterator has no next()".into()))?
        .clone();

    let this: JsValue = iterator.clone().into();
    let mut chunks = Vec::new();
    loop {
        let step = next
            .call(&this, &[], ctx)
            .map_err(|e| GatewayError::Handler(format!("Body iterator failed: {}", e)))?;
        let step = step
            .as_object()
            .ok_or_else(|| GatewayError::Handler("iterator result is not an object".into()))?
            .clone();

        let done = step
            .get(js_string!("done"), ctx)
            .map_err(|e| GatewayError::Handler(e.to_string()))?;
        if done.to_boolean() {
            break;
        }

        let value = step
            .get(js_string!("value"), ctx)
            .map_err(|e| GatewayError::Handler(e.to_string()))?;
        chunks.push(js_to_chunk(&value, ctx)?);
    }
    Ok(chunks)
}
