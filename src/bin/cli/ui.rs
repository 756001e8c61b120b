use graphport::cli::import_export::ImportSummary;
use graphport::export::ExportSummary;
use graphport::report::{Phase, ReportEvent, Reporter, TracingReporter};
use graphport::storage::LabelInfo;
use indicatif::{ProgressBar, ProgressStyle};
use nu_ansi_term::{Color, Style};
use std::io::IsTerminal;
use std::path::Path;
use std::time::{Duration, Instant};

/// Colour handling for terminal output.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Theme {
    /// Colour when stdout is a terminal.
    Auto,
    /// Never colour.
    Plain,
}

/// Human-readable rendering of run summaries.
pub struct Ui {
    styles: Styles,
    quiet: bool,
}

impl Ui {
    pub fn new(theme: Theme, quiet: bool) -> Self {
        let colour = theme == Theme::Auto && !quiet && std::io::stdout().is_terminal();
        #[cfg(windows)]
        if colour {
            let _ = nu_ansi_term::enable_ansi_support();
        }
        Self {
            styles: if colour { Styles::colour() } else { Styles::default() },
            quiet,
        }
    }

    pub fn import_summary(&self, db: &Path, summary: &ImportSummary, elapsed: Duration) {
        self.table(
            "Import",
            &[
                ("database", db.display().to_string()),
                ("vertices", summary.vertices.to_string()),
                ("edges", summary.edges.to_string()),
                ("skipped records", summary.skipped.to_string()),
                ("files", summary.files.len().to_string()),
                ("elapsed", elapsed_text(elapsed)),
            ],
        );
        let failed: Vec<String> = summary
            .files
            .iter()
            .filter_map(|file| {
                let err = file.error.as_ref()?;
                Some(format!("{}: {err}", file.path.display()))
            })
            .collect();
        self.bullets("Failed files", &failed);
        match failed.len() {
            0 => self.outcome(true, "Import completed"),
            n => self.outcome(false, &format!("Import completed with {n} failed file(s)")),
        }
    }

    pub fn export_summary(&self, db: &Path, summary: &ExportSummary, elapsed: Duration) {
        self.table(
            "Export",
            &[
                ("database", db.display().to_string()),
                ("vertices", summary.vertices.to_string()),
                ("edges", summary.edges.to_string()),
                ("elapsed", elapsed_text(elapsed)),
            ],
        );
        let files: Vec<String> = summary
            .labels
            .iter()
            .map(|label| {
                format!(
                    "{} ({}, {} records)",
                    label.path.display(),
                    label.encoding,
                    label.records
                )
            })
            .collect();
        self.bullets("Files", &files);
        self.outcome(true, "Export completed");
    }

    pub fn labels(&self, labels: &[LabelInfo]) {
        if labels.is_empty() {
            println!("No labels");
            return;
        }
        let width = labels.iter().map(|l| l.name.len()).max().unwrap_or(0);
        let rows: Vec<String> = labels
            .iter()
            .map(|l| format!("{:<width$}  {:<6}  id {}", l.name, l.kind.as_str(), l.id))
            .collect();
        self.bullets("Labels", &rows);
    }

    /// Starts a spinner that tracks batch progress; silent under `--quiet`.
    pub fn spinner(&self, action: impl Into<String>) -> Spinner {
        let action = action.into();
        let bar = (!self.quiet).then(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.set_message(action.clone());
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        });
        Spinner {
            action,
            start: Instant::now(),
            bar,
        }
    }

    fn table(&self, title: &str, rows: &[(&str, String)]) {
        println!("{}", self.styles.title.paint(title));
        let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        for (key, value) in rows {
            println!("  {} {value}", self.styles.key.paint(format!("{key:>width$}:")));
        }
    }

    fn bullets(&self, title: &str, entries: &[String]) {
        if entries.is_empty() {
            return;
        }
        println!("{}", self.styles.title.paint(title));
        for entry in entries {
            println!("  - {entry}");
        }
    }

    fn outcome(&self, ok: bool, message: &str) {
        if ok {
            println!("{}", self.styles.ok.paint(message));
        } else {
            eprintln!("{}", self.styles.warn.paint(message));
        }
    }
}

/// Spinner for one import or export run.
pub struct Spinner {
    action: String,
    start: Instant,
    bar: Option<ProgressBar>,
}

impl Spinner {
    fn progress(&self, detail: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("{}: {detail}", self.action));
        }
    }

    /// Clears the spinner and returns the time since it started.
    pub fn finish(mut self) -> Duration {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        self.start.elapsed()
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.abandon_with_message(format!(
                "{} interrupted after {}",
                self.action,
                elapsed_text(self.start.elapsed())
            ));
        }
    }
}

/// Mirrors batch commits onto a spinner, then forwards every event to tracing.
pub struct SpinnerReporter<'s> {
    spinner: &'s Spinner,
    inner: TracingReporter,
}

impl<'s> SpinnerReporter<'s> {
    pub fn new(spinner: &'s Spinner) -> Self {
        Self {
            spinner,
            inner: TracingReporter,
        }
    }
}

impl Reporter for SpinnerReporter<'_> {
    fn report(&mut self, event: ReportEvent) {
        if let ReportEvent::BatchCommitted { phase, progress } = &event {
            let verb = match phase {
                Phase::Vertices | Phase::Edges => "committed",
                Phase::Export => "written",
            };
            self.spinner.progress(&format!(
                "{} {phase}, {} {verb}",
                progress.label, progress.committed
            ));
        }
        self.inner.report(event);
    }
}

fn elapsed_text(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", elapsed.as_millis())
    } else {
        format!("{secs:.2}s")
    }
}

#[derive(Default)]
struct Styles {
    title: Style,
    key: Style,
    ok: Style,
    warn: Style,
}

impl Styles {
    fn colour() -> Self {
        Self {
            title: Style::new().fg(Color::Purple).bold(),
            key: Style::new().fg(Color::LightBlue),
            ok: Style::new().fg(Color::LightGreen).bold(),
            warn: Style::new().fg(Color::Yellow).bold(),
        }
    }
}
