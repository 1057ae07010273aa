//! Terminal presentation.
//!
//! A [`Console`] is built once by the binary and passed down explicitly.
//! It owns the output writer, the input reader used for confirmation, and
//! the color switch. Rendering helpers here only format; they never decide
//! workflow outcomes.

use std::collections::BTreeMap;
use std::io::{self, BufRead, StdinLock, Stdout, Write};

use crossterm::cursor::MoveTo;
use crossterm::style::{Color, Stylize};
use crossterm::terminal::{Clear, ClearType};

use crate::drift::{DriftReport, DriftResult, DriftState};
use crate::facts::render;
use crate::health::{self, Tone};
use crate::remediation::RemediationOutcome;
use crate::snapshot::Snapshot;

/// Text style for a rendered fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Plain,
    Accent,
    Heading,
    Good,
    GoodBold,
    Caution,
    Bad,
    BadBold,
    Highlight,
}

impl From<Tone> for Style {
    fn from(tone: Tone) -> Self {
        match tone {
            Tone::Favorable => Self::Good,
            Tone::Cautionary => Self::Caution,
            Tone::Unfavorable => Self::Bad,
        }
    }
}

/// One table cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub style: Style,
}

impl Cell {
    pub fn new(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, Style::Plain)
    }
}

/// A titled table with left-aligned columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    title: String,
    headers: Vec<&'static str>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(title: impl Into<String>, headers: &[&'static str]) -> Self {
        Self {
            title: title.into(),
            headers: headers.to_vec(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.text.chars().count());
            }
        }
        widths
    }
}

/// Build the health dashboard.
pub fn dashboard(snapshots: &BTreeMap<String, Snapshot>) -> Table {
    let mut table = Table::new(
        "Arista Fabric Pulse",
        &[
            "Device", "Model", "Version", "Uptime", "CPU", "Temp", "BGP", "MLAG", "Status",
        ],
    );

    for snap in snapshots.values() {
        let name = Cell::new(&snap.device_name, Style::Accent);
        if !snap.reachable {
            let mut row = vec![name];
            row.extend((0..7).map(|_| Cell::plain("-")));
            row.push(Cell::new(
                format!(
                    "UNREACHABLE {}",
                    snap.error_detail.as_deref().unwrap_or_default()
                ),
                Style::Bad,
            ));
            table.push_row(row);
            continue;
        }

        let severity = Style::from(snap.health().tone());
        table.push_row(vec![
            name,
            Cell::plain(render(&snap.model)),
            Cell::plain(render(&snap.software_version)),
            Cell::plain(render(&snap.uptime)),
            Cell::new(render(&snap.cpu_load), severity),
            Cell::new(render(&snap.max_temperature), severity),
            Cell::new(
                render(&snap.routing_summary),
                health::peer_tone(&snap.routing_summary).into(),
            ),
            Cell::new(
                render(&snap.link_agg_state),
                health::link_agg_tone(&snap.link_agg_state).into(),
            ),
            Cell::new("OK", Style::GoodBold),
        ]);
    }
    table
}

/// Build the drift table.
pub fn drift_table<'a>(results: impl IntoIterator<Item = &'a DriftResult>) -> Table {
    let mut table = Table::new("Drift Warden", &["Device", "Drift", "Reason", "Golden"]);
    for result in results {
        let (state, reason) = match &result.state {
            DriftState::Drifted { diff_lines } => (
                Cell::new("DRIFT", Style::BadBold),
                format!("{} diff lines", diff_lines.len()),
            ),
            DriftState::Unknown { reason } => (Cell::new("UNKNOWN", Style::Caution), reason.clone()),
            DriftState::Clean => (Cell::new("CLEAN", Style::Good), "No drift".to_string()),
        };
        table.push_row(vec![
            Cell::new(&result.device_name, Style::Accent),
            state,
            Cell::plain(reason),
            Cell::plain(result.baseline_path.display().to_string()),
        ]);
    }
    table
}

/// Diff body limited to `max_lines`, with a count of what was cut.
pub fn diff_preview(diff_lines: &[String], max_lines: usize) -> Vec<String> {
    let mut preview: Vec<String> = diff_lines.iter().take(max_lines).cloned().collect();
    if diff_lines.len() > max_lines {
        preview.push(format!("... ({} more lines)", diff_lines.len() - max_lines));
    }
    preview
}

/// Operator console.
pub struct Console<W, R> {
    out: W,
    input: R,
    color: bool,
}

impl Console<Stdout, StdinLock<'static>> {
    /// Console on the process's stdout and stdin.
    pub fn stdio(color: bool) -> Self {
        Self::new(io::stdout(), io::stdin().lock(), color)
    }
}

impl<W: Write, R: BufRead> Console<W, R> {
    pub fn new(out: W, input: R, color: bool) -> Self {
        Self { out, input, color }
    }

    /// Consume the console, returning the writer.
    pub fn into_output(self) -> W {
        self.out
    }

    pub fn paint(&self, text: &str, style: Style) -> String {
        if !self.color {
            return text.to_string();
        }
        let styled = match style {
            Style::Plain => return text.to_string(),
            Style::Accent => text.cyan(),
            Style::Heading => text.magenta().bold(),
            Style::Good => text.green(),
            Style::GoodBold => text.green().bold(),
            Style::Caution => text.yellow(),
            Style::Bad => text.red(),
            Style::BadBold => text.red().bold(),
            Style::Highlight => text.with(Color::Rgb {
                r: 255,
                g: 135,
                b: 0,
            }),
        };
        styled.to_string()
    }

    pub fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")
    }

    pub fn styled(&mut self, text: &str, style: Style) -> io::Result<()> {
        let painted = self.paint(text, style);
        writeln!(self.out, "{painted}")
    }

    /// A blank line followed by a section heading.
    pub fn heading(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out)?;
        self.styled(text, Style::Heading)
    }

    /// Clear the screen before redrawing a dashboard. No-op without color.
    pub fn clear(&mut self) -> io::Result<()> {
        if self.color {
            crossterm::execute!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        }
        Ok(())
    }

    pub fn table(&mut self, table: &Table) -> io::Result<()> {
        let widths = table.widths();
        let total = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);

        let title = self.paint(&table.title, Style::Heading);
        let pad = total.saturating_sub(table.title.chars().count()) / 2;
        writeln!(self.out, "{}{}", " ".repeat(pad), title)?;

        let header: Vec<String> = table
            .headers
            .iter()
            .zip(&widths)
            .map(|(h, w)| format!("{h:<w$}"))
            .collect();
        writeln!(self.out, "{}", header.join("  ").trim_end())?;
        writeln!(self.out, "{}", "━".repeat(total))?;

        for row in &table.rows {
            let cells: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(cell, w)| {
                    let fill = w.saturating_sub(cell.text.chars().count());
                    format!("{}{}", self.paint(&cell.text, cell.style), " ".repeat(fill))
                })
                .collect();
            writeln!(self.out, "{}", cells.join("  ").trim_end())?;
        }
        writeln!(self.out)
    }

    pub fn dashboard(&mut self, snapshots: &BTreeMap<String, Snapshot>) -> io::Result<()> {
        self.table(&dashboard(snapshots))
    }

    pub fn drift_report(&mut self, report: &DriftReport) -> io::Result<()> {
        self.table(&drift_table(report.iter()))
    }

    /// Boxed diff for one device, truncated to `max_lines`.
    pub fn diff_panel(
        &mut self,
        device_name: &str,
        diff_lines: &[String],
        max_lines: usize,
    ) -> io::Result<()> {
        if diff_lines.is_empty() {
            return Ok(());
        }
        let top = self.paint(&format!("╭─ Diff: {device_name} ─"), Style::Bad);
        let side = self.paint("│", Style::Bad);
        let bottom = self.paint("╰─", Style::Bad);

        writeln!(self.out, "{top}")?;
        for line in diff_preview(diff_lines, max_lines) {
            let style = match line.as_bytes().first() {
                Some(b'+') if !line.starts_with("+++") => Style::Good,
                Some(b'-') if !line.starts_with("---") => Style::Bad,
                Some(b'@') => Style::Accent,
                _ => Style::Plain,
            };
            let line = self.paint(&line, style);
            writeln!(self.out, "{side} {line}")?;
        }
        writeln!(self.out, "{bottom}")
    }

    /// One line per remediated device.
    pub fn outcomes(&mut self, outcomes: &BTreeMap<String, RemediationOutcome>) -> io::Result<()> {
        for outcome in outcomes.values() {
            let style = if outcome.succeeded() {
                Style::Good
            } else {
                Style::Bad
            };
            let name = self.paint(&outcome.device_name, style);
            writeln!(self.out, "{name}: {}", outcome.message)?;
        }
        Ok(())
    }

    /// Ask a yes/no question. Empty input or end of input picks `default`.
    pub fn confirm(&mut self, prompt: &str, default: bool) -> io::Result<bool> {
        let choices = if default { "Y/n" } else { "y/N" };
        let prompt = self.paint(prompt, Style::BadBold);

        loop {
            write!(self.out, "{prompt} [{choices}]: ")?;
            self.out.flush()?;

            let mut input = String::new();
            if self.input.read_line(&mut input)? == 0 {
                writeln!(self.out)?;
                return Ok(default);
            }
            match input.trim().to_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.out, "Please enter Y or N")?,
            }
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}
