/// Outcome of feeding one second into a `Countdown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownTick {
    Running(u32),
    Expired,
    /// The countdown was not running; nothing changed.
    Stopped,
}

/// One-second countdown. Expires exactly once, then stays stopped until reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Countdown {
    remaining: u32,
    running: bool,
}

impl Countdown {
    #[must_use]
    pub fn started(secs: u32) -> Self {
        let mut countdown = Self::default();
        countdown.reset(secs);
        countdown
    }

    pub fn reset(&mut self, secs: u32) {
        self.remaining = secs;
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn tick(&mut self) -> CountdownTick {
        if !self.running {
            return CountdownTick::Stopped;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.running = false;
            CountdownTick::Expired
        } else {
            CountdownTick::Running(self.remaining)
        }
    }
}
