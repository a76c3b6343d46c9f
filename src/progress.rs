//! Running byte counter shown while a transfer is in progress.

use std::io::Write;

/// Receives the running byte total after every completed window.
pub trait Progress {
    fn update(&mut self, bytes: u64);

    /// Called once when the transfer ends, successfully or not.
    fn finish(&mut self) {}
}

/// Discards all updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Progress for Silent {
    fn update(&mut self, _bytes: u64) {}
}

/// Keeps the latest total; handy for tests.
#[derive(Debug, Default, Clone)]
pub struct Recorded {
    pub updates: Vec<u64>,
}

impl Progress for Recorded {
    fn update(&mut self, bytes: u64) {
        self.updates.push(bytes);
    }
}

/// Rewrites a single stdout line: `\rSent: 5000 bytes`.
#[derive(Debug)]
pub struct Console {
    label: &'static str,
    drawn: bool,
}

impl Console {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            drawn: false,
        }
    }
}

impl Progress for Console {
    fn update(&mut self, bytes: u64) {
        let mut out = std::io::stdout().lock();
        // Progress output is best effort; a closed stdout must not abort the
        // transfer.
        let _ = write!(out, "\r{:50}\r{}: {} bytes", "", self.label, bytes);
        let _ = out.flush();
        self.drawn = true;
    }

    fn finish(&mut self) {
        if self.drawn {
            println!();
            self.drawn = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_keeps_every_update() {
        let mut p = Recorded::default();
        p.update(5_000);
        p.update(5_500);
        p.finish();
        assert_eq!(p.updates, vec![5_000, 5_500]);
    }
}
