//! Single-slot handoff of "currently decoding song" snapshots.
//!
//! The decoder publishes a [`Song`] built from the stream's tags; the control
//! side consumes it. Ownership moves into the slot on publish and out of it
//! on consume, so a publication is claimed by exactly one consumer.

use parking_lot::Mutex;

use super::state::MetadataState;
use crate::model::Song;

#[derive(Debug, Default)]
struct Slot {
    state: MetadataState,
    song: Option<Song>,
}

/// Publish/consume mailbox for metadata snapshots.
#[derive(Debug, Default)]
pub struct MetadataMailbox {
    slot: Mutex<Slot>,
}

impl MetadataMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a snapshot. An unclaimed older snapshot is replaced.
    pub fn publish(&self, song: Song) {
        let mut slot = self.slot.lock();
        if slot.state == MetadataState::Read {
            tracing::trace!(url = %song.url, "replacing unclaimed metadata snapshot");
        }
        slot.song = Some(song);
        slot.state = MetadataState::Read;
    }

    /// Claim the published snapshot, if there is one.
    pub fn consume(&self) -> Option<Song> {
        let mut slot = self.slot.lock();
        if slot.state != MetadataState::Read {
            return None;
        }
        slot.state = MetadataState::Write;
        slot.song.take()
    }

    /// Return the slot to `Write`, dropping an unclaimed snapshot.
    pub fn reset(&self) {
        let mut slot = self.slot.lock();
        if slot.state == MetadataState::Read {
            slot.state = MetadataState::Write;
            slot.song = None;
        }
    }

    pub fn state(&self) -> MetadataState {
        self.slot.lock().state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_consume_claims_publication_once() {
        let mailbox = MetadataMailbox::new();
        assert_eq!(mailbox.state(), MetadataState::Write);
        assert!(mailbox.consume().is_none());

        mailbox.publish(Song::new("/music/a.flac"));
        assert_eq!(mailbox.state(), MetadataState::Read);

        let song = mailbox.consume().expect("published snapshot");
        assert_eq!(song.url, "/music/a.flac");
        assert_eq!(mailbox.state(), MetadataState::Write);
        assert!(mailbox.consume().is_none());
    }

    #[test]
    fn test_latest_publication_wins() {
        let mailbox = MetadataMailbox::new();
        mailbox.publish(Song::new("first"));
        mailbox.publish(Song::new("second"));
        assert_eq!(mailbox.consume().map(|s| s.url), Some("second".to_string()));
        assert!(mailbox.consume().is_none());
    }

    #[test]
    fn test_reset_drops_unclaimed_snapshot() {
        let mailbox = MetadataMailbox::new();
        mailbox.publish(Song::new("stale"));
        mailbox.reset();
        assert_eq!(mailbox.state(), MetadataState::Write);
        assert!(mailbox.consume().is_none());

        mailbox.publish(Song::new("fresh"));
        assert_eq!(mailbox.consume().map(|s| s.url), Some("fresh".to_string()));
    }

    #[test]
    fn test_concurrent_consumers_single_winner() {
        for _ in 0..50 {
            let mailbox = Arc::new(MetadataMailbox::new());
            mailbox.publish(Song::new("contended"));
            let winners = Arc::new(AtomicUsize::new(0));

            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let mailbox = Arc::clone(&mailbox);
                    let winners = Arc::clone(&winners);
                    thread::spawn(move || {
                        if mailbox.consume().is_some() {
                            winners.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(winners.load(Ordering::SeqCst), 1);
        }
    }
}
