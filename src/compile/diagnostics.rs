use crate::bytecode::compile_error::CompileError;
use log::warn;
use std::fmt;

/// Errors reported during one generation pass.
///
/// Reporting never stops generation of sibling statements; the pass as a
/// whole failed if anything was reported.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<CompileError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, error: CompileError) {
        match error.line() {
            Some(line) => warn!("line {}: {}", line, error),
            None => warn!("{}", error),
        }
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompileError> {
        self.errors.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for error in &self.errors {
            match error.line() {
                Some(line) => writeln!(f, "error (line {}): {}", line, error)?,
                None => writeln!(f, "error: {}", error)?,
            }
        }
        Ok(())
    }
}
