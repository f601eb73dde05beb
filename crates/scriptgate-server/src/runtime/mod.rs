pub mod script;

mod bindings;
pub mod conversions;


pub use script::{ENTRY_POINT, ScriptHandler};
