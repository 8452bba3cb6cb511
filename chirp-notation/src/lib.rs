//! Text formats for Chirp
//!
//! - Parser: the line-oriented score notation (`NOTE[*MULT[*INSTRUMENT]]`)
//! - Config: the key=value startup configuration document
//!
//! Both are forgiving by design: malformed input degrades to documented
//! defaults with a warning, never an error. A live-coding session should
//! keep playing through typos.

mod config;
mod parser;

pub use config::Config;
pub use parser::{parse_line, NoteEvent};
