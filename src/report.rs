//! Console report: one banner line, then one latency line per backend.

use crate::runner::BackendResult;
use std::io::{self, Write};

pub const BANNER: &str = "Benchmarking Random Allocation and Reallocation:";

/// Render one result line, without the trailing newline.
pub fn format_result(result: &BackendResult) -> String {
    format!(
        "{} Random Alloc/Free: {:.2} ns",
        result.label, result.average_latency_ns
    )
}

pub struct Reporter<W: Write> {
    out: W,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn write_banner(&mut self) -> io::Result<()> {
        writeln!(self.out, "{BANNER}")
    }

    /// Write one result line and flush it, so lines appear as passes finish.
    pub fn write_result(&mut self, result: &BackendResult) -> io::Result<()> {
        writeln!(self.out, "{}", format_result(result))?;
        self.out.flush()
    }
}
