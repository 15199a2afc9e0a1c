//! Script execution
//!
//! A script is a sequence of binding-layer calls, one per line. Each line is
//! validated before it touches the bus; replies are printed as they come.

use std::io::{BufRead, Write};
use std::path::Path;

use gpiblpt_core::binding::{Call, Reply};
use gpiblpt_core::{Gpib, PortIo};

/// Outcome of a script run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    /// Calls that completed
    pub ok: usize,
    /// Calls that failed
    pub failed: usize,
}

/// Run every call in `script` on the bus
///
/// Stops at the first failing line unless `keep_going` is set. Output for
/// each reply goes to `out`.
pub fn run_lines<P: PortIo>(
    bus: &mut Gpib<P>,
    script: impl BufRead,
    keep_going: bool,
    out: &mut impl Write,
) -> Result<RunStats, Box<dyn std::error::Error>> {
    let mut stats = RunStats::default();

    for (index, line) in script.lines().enumerate() {
        let line = line?;
        let lineno = index + 1;

        let result = Call::parse_line(&line).and_then(|call| match call {
            Some(call) => call.execute(bus).map(Some),
            None => Ok(None),
        });

        match result {
            Ok(None) => {}
            Ok(Some(reply)) => {
                stats.ok += 1;
                match reply {
                    Reply::None => writeln!(out, "{}: ok", lineno)?,
                    reply => writeln!(out, "{}: {}", lineno, reply)?,
                }
            }
            Err(e) => {
                stats.failed += 1;
                writeln!(out, "{}: {} ({})", lineno, e.id(), e)?;
                if !keep_going {
                    return Err(format!("line {}: {}", lineno, e).into());
                }
            }
        }
    }

    log::debug!("script: {} ok, {} failed", stats.ok, stats.failed);
    Ok(stats)
}

/// Run a script file, or stdin when no file is given
pub fn cmd_run<P: PortIo>(
    bus: &mut Gpib<P>,
    script: Option<&Path>,
    keep_going: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout().lock();
    let stats = match script {
        Some(path) => {
            let file = std::fs::File::open(path)
                .map_err(|e| format!("Failed to open script {}: {}", path.display(), e))?;
            run_lines(bus, std::io::BufReader::new(file), keep_going, &mut stdout)?
        }
        None => run_lines(bus, std::io::stdin().lock(), keep_going, &mut stdout)?,
    };

    if stats.failed > 0 {
        return Err(format!("{} of {} calls failed", stats.failed, stats.ok + stats.failed).into());
    }
    Ok(())
}
