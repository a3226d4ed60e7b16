use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use log::LevelFilter;

use crate::error::ServerError;

/// Everything goes to the log file; verbose mode copies it to stderr too.
struct LogSink<W> {
    file: W,
    console: bool,
}

impl<W: Write> Write for LogSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.console {
            io::stderr().write_all(buf)?;
        }
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.console {
            io::stderr().flush()?;
        }
        self.file.flush()
    }
}

/// Installs the global logger. `RUST_LOG` may refine the default debug level.
pub fn init(verbose: bool, log_file: &Path) -> Result<(), ServerError> {
    let file: File = OpenOptions::new().create(true).append(true).open(log_file)?;

    env_logger::Builder::new()
        .filter_level(LevelFilter::Debug)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] - {} : {}",
                buf.timestamp(),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(LogSink {
            file,
            console: verbose,
        })))
        .try_init()?;
    Ok(())
}
