//! Default logging setup for the Probabilistic Model Checking Toolkit
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::undocumented_unsafe_blocks)]
#![warn(missing_docs)]

use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Instant,
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct MemoryAmount(usize);

impl fmt::Display for MemoryAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 1000 {
            write!(f, "{:5}B", self.0)
        } else if self.0 < 1000 << 10 {
            write!(f, "{:5.1}K", self.0 as f64 / (1u64 << 10) as f64)
        } else if self.0 < 1000 << 20 {
            write!(f, "{:5.1}M", self.0 as f64 / (1u64 << 20) as f64)
        } else {
            write!(f, "{:5.1}G", self.0 as f64 / (1u64 << 30) as f64)
        }
    }
}

/// Peak resident set size of this process, as reported by `getrusage`.
fn peak_rss() -> Option<MemoryAmount> {
    #[cfg(all(unix, not(miri)))]
    {
        // SAFETY: rusage is plain old data so all zeros is valid
        let mut rusage: libc::rusage = unsafe { std::mem::zeroed() };
        // SAFETY: getrusage only writes to the passed pointer, which is valid for writes
        if unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut rusage) } < 0 {
            return None;
        }
        // Linux reports KiB, macOS reports bytes
        let scale = if cfg!(target_os = "macos") { 1 } else { 1024 };
        Some(MemoryAmount(rusage.ru_maxrss as usize * scale))
    }
    #[cfg(not(all(unix, not(miri))))]
    {
        None
    }
}

/// Current resident set size, only available on Linux.
fn current_rss() -> Option<MemoryAmount> {
    #[cfg(all(target_os = "linux", not(miri)))]
    {
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        let rss_pages = statm.split_ascii_whitespace().nth(1)?.parse::<usize>().ok()?;
        // SAFETY: standard way to obtain the page size, has no preconditions
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        Some(MemoryAmount(rss_pages * usize::try_from(page_size).ok()?))
    }
    #[cfg(not(all(target_os = "linux", not(miri))))]
    {
        None
    }
}

const TIMESTAMP_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::BrightBlack)));

const MEMORY_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Blue)));
const MEMORY_NEW_PEAK_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red)));

const TARGET_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Magenta)));

fn builder() -> env_logger::Builder {
    let start_time = Instant::now();
    let peak = AtomicUsize::new(peak_rss().map_or(0, |amount| amount.0));
    let last_target = Mutex::new(String::new());

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::new()
            .filter_or("PMCTK_LOG", "info")
            .write_style("PMCTK_LOG_STYLE"),
    );

    builder.format(move |buf, record| {
        use std::io::Write;

        let timestamp = start_time.elapsed();
        let level = record.level();
        let target = record.target();

        let memory = match (current_rss(), peak_rss()) {
            (Some(current), Some(max)) => {
                let new_peak = peak.fetch_max(max.0, Ordering::Relaxed) < max.0;
                let style = if new_peak {
                    MEMORY_NEW_PEAK_STYLE
                } else {
                    MEMORY_STYLE
                };
                format!("{style}{current}{style:#} ")
            }
            (None, Some(max)) => format!("{style}{max}{style:#} ", style = MEMORY_STYLE),
            _ => String::new(),
        };

        {
            let mut last_target = last_target.lock().unwrap_or_else(|err| err.into_inner());
            if target != *last_target {
                last_target.clear();
                last_target.push_str(target);
                writeln!(
                    buf,
                    "{} {}{}",
                    format_args!("{style}{timestamp:>9.2?}{style:#}", style = TIMESTAMP_STYLE),
                    memory,
                    format_args!("{style}{target}{style:#}", style = TARGET_STYLE),
                )?;
            }
        }

        writeln!(
            buf,
            "{} {}{} {}",
            format_args!("{style}{timestamp:>9.2?}{style:#}", style = TIMESTAMP_STYLE),
            memory,
            format_args!(
                "{style}{level:5}{style:#}",
                style = buf.default_level_style(level),
            ),
            record.args(),
        )
    });

    builder
}

/// Perform the default logging setup used by pmctk binaries.
///
/// The filter is read from `PMCTK_LOG` (defaulting to `info`) and the color choice from
/// `PMCTK_LOG_STYLE`.
///
/// # Panics
///
/// Panics when a global logger was already installed.
pub fn setup() {
    builder().init();
}

/// Like [`setup`], but intended for tests: output goes through the test harness capture and an
/// already installed logger is not an error.
pub fn setup_for_tests() {
    let _ = builder().is_test(true).try_init();
}
