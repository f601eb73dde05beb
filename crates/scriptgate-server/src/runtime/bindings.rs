//! JavaScript bindings for scriptgate
//!
//! This module provides the native Rust functions exposed to handler scripts
//! running in Boa.
//!
//! # JavaScript API
//!
//! Base environment, installed once per compiled script:
//!
//! - `gateway.log(...args)` - Log a line through the logging collaborator,
//!   tagged with the script identifier
//! - `gateway.scriptId` - Identifier the script was loaded under
//!
//! Per-request environment, passed as the single argument to `run(env)`:
//!
//! - `env.REQUEST_METHOD`, `env.QUERY_STRING`, ... - Metavariables; any
//!   property that was never set reads as `""`
//! - `env.input.read(n)` - Read up to `n` body bytes (all remaining when `n`
//!   is omitted) as a binary string: one UTF-16 code unit per byte, so
//!   `charCodeAt(i)` is the `i`th byte
//! - `env.errors.write(...args)` - Write to the request's error stream
//!
//! Native functions keep their state in `Trace` capture structs passed to
//! `NativeFunction::from_copy_closure_with_captures`. The captured values are
//! plain Rust data, so their fields are marked `#[unsafe_ignore_trace]`.

use boa_engine::{
    Context, JsResult, JsString, Source, js_string,
    native_function::NativeFunction,
    object::{FunctionObjectBuilder, JsObject},
    property::Attribute,
    value::JsValue,
};
use boa_gc::{Finalize, Trace};
use scriptgate_common::{GatewayError, Result, ScriptId};
use std::cell::RefCell;
use std::sync::Arc;

use crate::environ::{Environ, ErrorStream, InputStream, LogSink};

/// Wraps the metavariable object so unknown properties read as `""`.
const ENV_WRAPPER: &str = r#"
(function (vars) {
    return new Proxy(vars, {
        get(target, key, receiver) {
            if (typeof key === "symbol" || key in target) {
                return Reflect.get(target, key, receiver);
            }
            return "";
        }
    });
})
"#;

#[derive(Trace, Finalize)]
struct LogCapture {
    source: String,
    #[unsafe_ignore_trace]
    sink: Arc<dyn LogSink>,
}

#[derive(Trace, Finalize)]
struct InputCapture {
    #[unsafe_ignore_trace]
    input: RefCell<InputStream>,
}

#[derive(Trace, Finalize)]
struct ErrorCapture {
    #[unsafe_ignore_trace]
    errors: ErrorStream,
}

/// Install the base environment into a fresh Boa context.
///
/// This is the single place where the loader exposes host functions to a
/// compiled script. Everything else the script sees is the language's own
/// built-ins.
///
/// # Errors
///
/// Returns `GatewayError::Load` if creating the `gateway` object or
/// registering it as a global fails.
pub(crate) fn install_gateway_bindings(
    ctx: &mut Context,
    script_id: &ScriptId,
    sink: Arc<dyn LogSink>,
) -> Result<()> {
    let gateway = JsObject::with_object_proto(ctx.intrinsics());

    let log = NativeFunction::from_copy_closure_with_captures(
        |_this, args, captures: &LogCapture, context| {
            let line = join_args(args, " ", context)?;
            captures.sink.log(&line, &captures.source);
            Ok(JsValue::undefined())
        },
        LogCapture {
            source: script_id.to_string(),
            sink,
        },
    );
    let log_fn = FunctionObjectBuilder::new(ctx.realm(), log)
        .name(js_string!("log"))
        .length(0)
        .build();

    gateway
        .set(js_string!("log"), log_fn, false, ctx)
        .map_err(|e| GatewayError::Load(e.to_string()))?;
    gateway
        .set(js_string!("scriptId"), js_string!(script_id.to_string()), false, ctx)
        .map_err(|e| GatewayError::Load(e.to_string()))?;

    ctx.register_global_property(js_string!("gateway"), gateway, Attribute::all())
        .map_err(|e| GatewayError::Load(e.to_string()))?;

    Ok(())
}

/// Compile the metavariable wrapper inside `ctx`.
///
/// The returned function takes a plain object and returns the defaulting
/// proxy around it. It is created once per script and reused per request.
pub(crate) fn env_wrapper(ctx: &mut Context) -> Result<JsObject> {
    let wrapper = ctx
        .eval(Source::from_bytes(ENV_WRAPPER))
        .map_err(|e| GatewayError::Load(format!("Failed to install env wrapper: {}", e)))?;

    let wrapper = wrapper
        .as_object()
        .filter(|o| o.is_callable())
        .ok_or_else(|| GatewayError::Load("env wrapper is not a function".into()))?;
    Ok(wrapper.clone())
}

/// Build the JavaScript view of one request's [`Environ`].
pub(crate) fn env_object(env: Environ, wrapper: &JsObject, ctx: &mut Context) -> Result<JsValue> {
    let Environ { vars, input, errors } = env;
    let target = JsObject::with_object_proto(ctx.intrinsics());

    for (key, value) in vars.iter() {
        target
            .set(js_string!(key), js_string!(value), false, ctx)
            .map_err(|e| GatewayError::Handler(format!("Failed to set '{}': {}", key, e)))?;
    }

    let input_obj = input_object(input, ctx)?;
    target
        .set(js_string!("input"), input_obj, false, ctx)
        .map_err(|e| GatewayError::Handler(e.to_string()))?;

    let errors_obj = errors_object(errors, ctx)?;
    target
        .set(js_string!("errors"), errors_obj, false, ctx)
        .map_err(|e| GatewayError::Handler(e.to_string()))?;

    wrapper
        .call(&JsValue::undefined(), &[target.into()], ctx)
        .map_err(|e| GatewayError::Handler(format!("Failed to wrap env: {}", e)))
}

fn input_object(input: InputStream, ctx: &mut Context) -> Result<JsObject> {
    let read = NativeFunction::from_copy_closure_with_captures(
        |_this, args, captures: &InputCapture, context| {
            let n = match args.first() {
                Some(v) if !v.is_undefined() && !v.is_null() => {
                    let n = v.to_number(context)?;
                    // NaN and negatives read nothing; `as` saturates +inf.
                    Some(if n > 0.0 { n as usize } else { 0 })
                }
                _ => None,
            };
            let bytes = captures.input.borrow_mut().read(n);
            Ok(JsValue::new(binary_string(&bytes)))
        },
        InputCapture {
            input: RefCell::new(input),
        },
    );

    let read_fn = FunctionObjectBuilder::new(ctx.realm(), read)
        .name(js_string!("read"))
        .length(1)
        .build();

    let obj = JsObject::with_object_proto(ctx.intrinsics());
    obj.set(js_string!("read"), read_fn, false, ctx)
        .map_err(|e| GatewayError::Handler(e.to_string()))?;
    Ok(obj)
}

fn errors_object(errors: ErrorStream, ctx: &mut Context) -> Result<JsObject> {
    let write = NativeFunction::from_copy_closure_with_captures(
        |_this, args, captures: &ErrorCapture, context| {
            let text = join_args(args, "", context)?;
            captures.errors.write([text]);
            Ok(JsValue::undefined())
        },
        ErrorCapture { errors },
    );

    let write_fn = FunctionObjectBuilder::new(ctx.realm(), write)
        .name(js_string!("write"))
        .length(0)
        .build();

    let obj = JsObject::with_object_proto(ctx.intrinsics());
    obj.set(js_string!("write"), write_fn, false, ctx)
        .map_err(|e| GatewayError::Handler(e.to_string()))?;
    Ok(obj)
}

/// Widen each byte to one UTF-16 code unit, so no byte sequence is lost.
fn binary_string(bytes: &[u8]) -> JsString {
    let units: Vec<u16> = bytes.iter().map(|&b| u16::from(b)).collect();
    JsString::from(units.as_slice())
}

/// Stringify every argument with JavaScript `ToString` semantics.
fn join_args(args: &[JsValue], separator: &str, ctx: &mut Context) -> JsResult<String> {
    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        let s: JsString = arg.to_string(ctx)?;
        parts.push(s.to_std_string_escaped());
    }
    Ok(parts.join(separator))
}
