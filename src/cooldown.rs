use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::{Duration, Instant};

// Per-user cooldown: user id -> last accepted trigger.
// Entries are never evicted.
pub struct Cooldown {
    last_trigger: DashMap<i64, Instant>,
    window: Duration,
}

impl Cooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            last_trigger: DashMap::new(),
            window,
        }
    }

    // Accepts and records the trigger, or returns the time left to wait.
    // A rejected trigger does not restart the window.
    pub fn check(&self, user_id: i64) -> Result<(), Duration> {
        self.check_at(user_id, Instant::now())
    }

    fn check_at(&self, user_id: i64, now: Instant) -> Result<(), Duration> {
        if self.window.is_zero() {
            return Ok(());
        }

        match self.last_trigger.entry(user_id) {
            Entry::Vacant(vacant) => {
                vacant.insert(now);
                Ok(())
            }
            Entry::Occupied(mut occupied) => {
                let elapsed = now.saturating_duration_since(*occupied.get());
                if elapsed < self.window {
                    return Err(self.window - elapsed);
                }
                occupied.insert(now);
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.last_trigger.len()
    }
}
