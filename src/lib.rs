pub mod component;
pub mod config;
pub mod error;
pub mod init;
pub mod menu;
pub mod outcome;
pub mod pipeline;
pub mod signal;
pub mod tools;

pub use error::{CodecError, MediaError, MediaResult};
pub use outcome::{BatchResult, FailureKind, Outcome};

use anyhow::Result;
use console::{Term, style};

pub fn pause(term: &Term) -> Result<()> {
    println!("\n{}", style("按 Enter 繼續...").dim());
    term.read_line()?;
    Ok(())
}
