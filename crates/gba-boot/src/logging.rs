use std::io::Write;

use colored::Colorize;
use gba_multiboot::Progress;

#[macro_export]
macro_rules! log {
    ($s:literal) => {{
        print!($s);
        stdout().flush()?;
    }};
}

#[macro_export]
macro_rules! status {
    ($code:expr) => {{
        let ret = $code;
        match &ret {
            Ok(_) => println!("{}", "ok".green()),
            Err(_) => println!("{}", "failed".red()),
        }
        ret
    }};
}

const BAR_WIDTH: u32 = 40;

/// Payload progress bar, redrawn in place whenever the percentage changes.
pub struct Bar<W: Write> {
    out: W,
    percent: Option<u32>,
    failed: bool,
}

impl<W: Write> Bar<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            percent: None,
            failed: false,
        }
    }

    fn draw(&mut self, percent: u32, done: u32, total: u32) -> std::io::Result<()> {
        let filled = (percent * BAR_WIDTH / 100) as usize;
        write!(
            self.out,
            "\r[{}{}] {percent:3}% {done:#x}/{total:#x}",
            "#".repeat(filled),
            " ".repeat(BAR_WIDTH as usize - filled)
        )?;
        if done >= total {
            writeln!(self.out)?;
        }
        self.out.flush()
    }
}

impl<W: Write> Progress for Bar<W> {
    fn report(&mut self, done: u32, total: u32) {
        let percent = (done as u64 * 100 / total.max(1) as u64) as u32;
        if self.percent == Some(percent) {
            return;
        }
        self.percent = Some(percent);

        if let Err(e) = self.draw(percent, done, total) {
            if !self.failed {
                self.failed = true;
                eprintln!("{}", format!("Progress output failed: {e}").yellow());
            }
        }
    }
}
