//! Terminal output for commands.
//!
//! Data (tables, JSON, config values) goes to stdout. Status lines and
//! download progress go to stderr so the data stays pipeable:
//!
//! ```rust,ignore
//! use dcos::output::Output;
//!
//! Output::table(&[vec!["NAME".into(), "ID".into()], vec!["prod".into(), "6a14".into()]]);
//! Output::success("prod is now attached");
//! Output::warning("authentication is disabled on this cluster");
//! ```

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

/// Gap between table columns.
const COLUMN_GAP: &str = "   ";

pub struct Output;

impl Output {
    pub fn success(msg: impl AsRef<str>) {
        eprintln!("{} {}", "✓".green().bold(), msg.as_ref());
    }

    pub fn error(msg: impl AsRef<str>) {
        eprintln!("{}", msg.as_ref().red());
    }

    pub fn warning(msg: impl AsRef<str>) {
        eprintln!("{} {}", "warning:".yellow().bold(), msg.as_ref());
    }

    pub fn info(msg: impl AsRef<str>) {
        eprintln!("{}", msg.as_ref().dimmed());
    }

    /// A suggested next step for the user.
    pub fn hint(msg: impl AsRef<str>) {
        eprintln!("  {} {}", "→".cyan(), msg.as_ref());
    }

    /// Print rows as aligned columns on stdout, the first row being the
    /// header.
    pub fn table(rows: &[Vec<String>]) {
        for (index, line) in format_table(rows).into_iter().enumerate() {
            if index == 0 {
                println!("{}", line.bold());
            } else {
                println!("{line}");
            }
        }
    }

    /// Spinner shown on stderr while a plugin package downloads.
    pub fn download(url: &str) -> Download {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(format!("Downloading {url}"));
        bar.enable_steady_tick(Duration::from_millis(80));
        Download {
            bar,
            url: url.to_string(),
        }
    }
}

/// Progress of a single download. Dropping it without calling
/// [`Download::done`] leaves the spinner line in place.
pub struct Download {
    bar: ProgressBar,
    url: String,
}

impl Download {
    /// Clear the spinner line.
    pub fn done(self) {
        self.bar.finish_and_clear();
    }

    pub fn failed(self) {
        self.bar
            .finish_with_message(format!("{} couldn't download {}", "✗".red().bold(), self.url));
    }
}

/// Pad every cell to its column's width. Trailing padding is dropped and
/// short rows are allowed.
fn format_table(rows: &[Vec<String>]) -> Vec<String> {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0; columns];
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    rows.iter()
        .map(|row| {
            row.iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join(COLUMN_GAP)
                .trim_end()
                .to_string()
        })
        .collect()
}
