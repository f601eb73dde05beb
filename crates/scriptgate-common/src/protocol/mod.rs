pub mod error;
pub mod headers;
pub mod requests;
pub mod responses;
pub mod script_id;


pub use error::{GatewayError, Result};
pub use headers::Headers;
pub use requests::{Request, DEFAULT_PROTOCOL};
pub use responses::{Body, Chunk, Response};
pub use script_id::ScriptId;
