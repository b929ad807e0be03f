//! # Scripts
//!
//! Opcode encoding, the name lock script, and the interpreter that checks
//! witnesses against both.

pub mod interpreter;
pub mod lock;
pub mod opcode;

pub use interpreter::{verify_input, ScriptError};
pub use lock::{create_lock_script, lock_script_address};
pub use opcode::{Opcode, Script};
