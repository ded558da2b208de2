//! # Terminal Renderer
//!
//! Prints published snapshots as a growing table:
//!
//! ```text
//! Time     | Temperature (°C) | Humidity (%RH)
//! ---------+------------------+---------------
//! 22.13.20 |            25.50 |          60.12
//! ```
//!
//! The renderer remembers how many rows of the current session it has
//! printed. A new session reprints the header; an append prints only the new
//! rows.

use sensorwatch_core::{Reading, SeriesSnapshot, SessionId};
use std::io::{self, Write};

const TIME_WIDTH: usize = 8;
const TEMPERATURE_HEADER: &str = "Temperature (°C)";
const HUMIDITY_HEADER: &str = "Humidity (%RH)";

/// Incremental table writer.
#[derive(Debug)]
pub struct TableRenderer<W> {
    out: W,
    session: Option<SessionId>,
    printed: usize,
    header_printed: bool,
}

impl<W: Write> TableRenderer<W> {
    #[must_use]
    pub fn new(out: W) -> Self {
        Self {
            out,
            session: None,
            printed: 0,
            header_printed: false,
        }
    }

    /// Bring the output up to date with `snapshot`.
    pub fn render(&mut self, snapshot: &SeriesSnapshot) -> io::Result<()> {
        if !self.header_printed
            || snapshot.session() != self.session
            || snapshot.len() < self.printed
        {
            self.start_table(snapshot.session())?;
        }

        for reading in (self.printed..snapshot.len()).filter_map(|i| snapshot.get(i)) {
            writeln!(self.out, "{}", format_row(reading))?;
        }
        self.printed = snapshot.len();
        self.out.flush()
    }

    /// Write a one-line status message outside the table.
    pub fn notice(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "-- {}", message)?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn start_table(&mut self, session: Option<SessionId>) -> io::Result<()> {
        if self.header_printed {
            writeln!(self.out)?;
        }
        if let Some(session) = session {
            writeln!(self.out, "Session {}", session)?;
        }
        writeln!(self.out, "{}", header())?;
        writeln!(self.out, "{}", separator())?;
        self.session = session;
        self.printed = 0;
        self.header_printed = true;
        Ok(())
    }
}

/// Column header line.
#[must_use]
pub fn header() -> String {
    format!(
        "{:<width$} | {} | {}",
        "Time",
        TEMPERATURE_HEADER,
        HUMIDITY_HEADER,
        width = TIME_WIDTH
    )
}

fn separator() -> String {
    format!(
        "{}-+-{}-+-{}",
        "-".repeat(TIME_WIDTH),
        "-".repeat(TEMPERATURE_HEADER.chars().count()),
        "-".repeat(HUMIDITY_HEADER.chars().count())
    )
}

/// One table row; values keep two decimals.
#[must_use]
pub fn format_row(reading: &Reading) -> String {
    format!(
        "{:<tw$} | {:>vw$} | {:>hw$}",
        reading.observed_at(),
        reading.temperature_celsius().to_string(),
        reading.humidity_percent().to_string(),
        tw = TIME_WIDTH,
        vw = TEMPERATURE_HEADER.chars().count(),
        hw = HUMIDITY_HEADER.chars().count()
    )
}

// =============================================================================
// TESTS
// =============================================================================
