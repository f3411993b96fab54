/// User interface and status output utilities
///
/// This module handles:
/// - Thread-safe console output
/// - Colored terminal text
/// - Human-readable report summaries

use crate::types::GeneratedReport;
use lazy_static::lazy_static;
use std::io::Write;
use std::sync::Mutex;

/// Execute a function with exclusive access to console output
fn status_lock<F>(f: F)
where
    F: FnOnce(),
{
    lazy_static! {
        static ref LOCK: Mutex<()> = Mutex::new(());
    }
    let _guard = LOCK.lock();
    f();
}

/// Print colored text to the given terminal, with fallback to plain text
fn print_color(s: &str, fg: term::color::Color, stderr: bool) {
    let printed = if stderr {
        term::stderr().is_some_and(|mut t| really_print_color(&mut *t, s, fg))
    } else {
        term::stdout().is_some_and(|mut t| really_print_color(&mut *t, s, fg))
    };

    if !printed {
        if stderr {
            eprint!("{}", s);
        } else {
            print!("{}", s);
        }
    }

    fn really_print_color<T: term::Terminal + ?Sized>(t: &mut T, s: &str, fg: term::color::Color) -> bool {
        if t.fg(fg).is_err() {
            return false;
        }
        let _ = t.attr(term::Attr::Bold);
        let ok = write!(t, "{}", s).is_ok();
        let _ = t.reset();
        ok
    }
}

/// Print a status message with "report: " prefix (thread-safe)
pub fn status(s: &str) {
    status_lock(|| {
        println!("report: {}", s);
    });
}

/// Print a renderer or fetch warning
pub fn print_warning(msg: &str) {
    status_lock(|| {
        print_color("warning", term::color::BRIGHT_YELLOW, true);
        eprintln!(": {}", msg);
    });
}

/// Print an error message with colored "error" prefix
pub fn print_error(msg: &str) {
    status_lock(|| {
        eprintln!();
        print_color("error", term::color::BRIGHT_RED, true);
        eprintln!(": {}", msg);
        eprintln!();
    });
}

/// Print the outcome of a successful `generate`
pub fn print_report(report: &GeneratedReport) {
    for warning in &report.warnings {
        print_warning(warning);
    }
    status(&format!("wrote {} ({} bytes, {})", report.path.display(), report.bytes_written, report.mime_type));
}
