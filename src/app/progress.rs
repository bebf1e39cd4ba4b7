//! Terminal progress bar for the download currently streaming.

use std::io::IsTerminal;
use std::sync::{Arc, Mutex, PoisonError};

use harvester_core::{LogProgress, ProgressObserver, megabytes, progress_message};
use indicatif::{ProgressBar, ProgressStyle};

/// Picks the progress observer: a bar on an interactive stderr, log events otherwise.
///
/// With `quiet` the log observer is still used; the `error` filter hides it.
pub(crate) fn select_progress(quiet: bool) -> Arc<dyn ProgressObserver> {
    if !quiet && std::io::stderr().is_terminal() {
        Arc::new(BarProgress::default())
    } else {
        Arc::new(LogProgress::new())
    }
}

/// Renders percentage and megabytes of the active transfer with indicatif.
#[derive(Debug, Default)]
pub(crate) struct BarProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl BarProgress {
    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        let guard = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bar) = guard.as_ref() {
            f(bar);
        }
    }
}

impl ProgressObserver for BarProgress {
    fn started(&self, label: &str, total_bytes: Option<u64>) {
        let bar = match total_bytes {
            Some(total) if total > 0 => {
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::with_template(
                        "{prefix} [{bar:30}] {msg}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
                );
                bar
            }
            _ => {
                let spinner = ProgressBar::new_spinner();
                spinner.set_style(
                    ProgressStyle::with_template("{spinner} {prefix} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                spinner
            }
        };
        bar.set_prefix(label.to_string());
        let mut slot = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.replace(bar) {
            previous.finish_and_clear();
        }
    }

    fn advanced(&self, received: u64, total_bytes: Option<u64>) {
        self.with_bar(|bar| {
            bar.set_position(received);
            bar.set_message(progress_message(received, total_bytes));
        });
    }

    fn finished(&self, received: u64, complete: bool) {
        let mut slot = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bar) = slot.take() {
            if complete {
                bar.finish_with_message(format!("{:.2} MB done", megabytes(received)));
            } else {
                bar.abandon_with_message(format!(
                    "{:.2} MB, attempt failed",
                    megabytes(received)
                ));
            }
        }
    }
}
