//! Configuration change watcher.
//!
//! Filters display-configuration notifications down to actual changes.
//! Compositors announce far more output events than real reconfigurations
//! (one per property, repeats on mode re-sets), so every notification is
//! compared against the last known signature set before anything is torn
//! down.

use common::SignatureSet;

#[derive(Debug, Default)]
pub struct ConfigWatcher {
    last_known: SignatureSet,
    notifications: u64,
    changes: u64,
}

impl ConfigWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a notification with the display set enumerated for it.
    ///
    /// Returns the new set when it differs from the last known one (and
    /// remembers it), `None` for a redundant notification.
    pub fn observe(&mut self, current: SignatureSet) -> Option<SignatureSet> {
        self.notifications += 1;

        if current == self.last_known {
            log::debug!(
                "Display configuration notification #{} without changes, ignoring",
                self.notifications
            );
            return None;
        }

        log::info!(
            "Display configuration changed: {} -> {} display(s)",
            self.last_known.len(),
            current.len()
        );
        for display in &current {
            log::debug!("  {}", display);
        }

        self.changes += 1;
        self.last_known = current.clone();
        Some(current)
    }

    /// Adopt `current` unconditionally (startup, compositor-closed surfaces)
    pub fn force(&mut self, current: SignatureSet) -> SignatureSet {
        self.last_known = current.clone();
        current
    }

    #[cfg(test)]
    pub fn last_known(&self) -> &SignatureSet {
        &self.last_known
    }

    /// Number of notifications that turned out to be real changes
    #[cfg(test)]
    pub fn changes(&self) -> u64 {
        self.changes
    }
}
