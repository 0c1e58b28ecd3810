// Animation frame tickets.
//
// The engine never sleeps. It asks for a frame at some instant and the host
// loop calls back with the ticket's generation once that instant passes.
// Scheduling again, or cancelling, bumps the generation so a ticket the host
// already picked up is ignored when it finally fires.

use std::time::{Duration, Instant};

/// Nominal frame spacing (60 Hz).
pub const FRAME_INTERVAL: Duration = Duration::from_millis(1000 / 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRequest {
    pub due: Instant,
    pub generation: u64,
}

#[derive(Debug, Default)]
pub struct FrameScheduler {
    generation: u64,
    pending: Option<FrameRequest>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any pending frame with one due at `due`.
    pub fn schedule(&mut self, due: Instant) -> FrameRequest {
        self.generation += 1;
        let request = FrameRequest {
            due,
            generation: self.generation,
        };
        self.pending = Some(request);
        request
    }

    pub fn cancel(&mut self) {
        if self.pending.take().is_some() {
            self.generation += 1;
        }
    }

    pub fn pending(&self) -> Option<FrameRequest> {
        self.pending
    }

    /// Consume the pending frame if `generation` still names it. Returns the
    /// instant it was due.
    pub fn claim(&mut self, generation: u64) -> Option<Instant> {
        match self.pending {
            Some(request) if request.generation == generation => {
                self.pending = None;
                Some(request.due)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescheduling_supersedes_old_ticket() {
        let now = Instant::now();
        let mut frames = FrameScheduler::new();
        let first = frames.schedule(now + FRAME_INTERVAL);
        let second = frames.schedule(now + FRAME_INTERVAL * 2);

        assert_ne!(first.generation, second.generation);
        assert_eq!(frames.claim(first.generation), None);
        assert_eq!(frames.claim(second.generation), Some(second.due));
        assert_eq!(frames.pending(), None);
    }

    #[test]
    fn cancelled_ticket_is_ignored() {
        let mut frames = FrameScheduler::new();
        let ticket = frames.schedule(Instant::now());
        frames.cancel();
        assert_eq!(frames.claim(ticket.generation), None);
    }
}
