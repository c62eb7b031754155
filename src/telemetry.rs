//! Fixed-capacity diagnostic ring written at a decimated rate.
//!
//! The queue never blocks and never grows: once full it overwrites its oldest
//! record. The host drains it between blocks.

/// What a telemetry record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum TelemetryKind {
    /// Voice playhead; the subtype is the voice index.
    VoicePlayhead = 1,
    /// Loop length seen by the transport.
    LoopLength = 2,
    /// Playback rate.
    Rate = 3,
    /// Loop length handed to the voices.
    VoiceLoopLength = 4,
    /// Playhead scan rate.
    ScanRate = 5,
    /// Playhead target handed to the voices.
    PlayheadTarget = 6,
}

impl TelemetryKind {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// One diagnostic record.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetryMessage {
    pub kind: i32,
    pub subtype: f32,
    pub payload: f32,
    pub time: f32,
}

/// Circular array of telemetry records.
#[derive(Debug, Clone)]
pub struct TelemetryQueue {
    records: Vec<TelemetryMessage>,
    cursor: usize,
    wrapped: bool,
}

impl TelemetryQueue {
    /// Allocate a ring of `capacity` zeroed records.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "telemetry capacity must be nonzero");
        Self {
            records: vec![TelemetryMessage::default(); capacity],
            cursor: 0,
            wrapped: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    /// Write at the cursor and advance it, overwriting the oldest record once full.
    #[inline]
    pub fn push(&mut self, kind: i32, subtype: f32, payload: f32, time: f32) {
        self.records[self.cursor] = TelemetryMessage {
            kind,
            subtype,
            payload,
            time,
        };
        self.cursor += 1;
        if self.cursor >= self.records.len() {
            self.cursor = 0;
            self.wrapped = true;
        }
    }

    /// Raw cursor position. After a wrap this under-reports the records written.
    pub fn count(&self) -> usize {
        self.cursor
    }

    /// True once the ring has overwritten (or is about to overwrite) its first record.
    pub fn has_wrapped(&self) -> bool {
        self.wrapped
    }

    /// The whole fixed array, in storage order.
    pub fn snapshot(&self) -> &[TelemetryMessage] {
        &self.records
    }

    /// Reset the cursor. Record contents are left in place.
    pub fn clear(&mut self) {
        self.cursor = 0;
        self.wrapped = false;
    }

    /// Live records, oldest first.
    pub fn chronological(&self) -> impl Iterator<Item = &TelemetryMessage> {
        let (older, newer): (&[TelemetryMessage], &[TelemetryMessage]) = if self.wrapped {
            (&self.records[self.cursor..], &self.records[..self.cursor])
        } else {
            (&self.records[..self.cursor], &[])
        };
        older.iter().chain(newer.iter())
    }
}

/// Shared decimation counter: fires on every `interval`-th tick, starting with the first.
#[derive(Debug, Clone)]
pub struct Decimator {
    counter: u32,
    interval: u32,
}

impl Decimator {
    pub fn new(interval: u32) -> Self {
        assert!(interval > 0, "decimation interval must be nonzero");
        Self {
            counter: 0,
            interval,
        }
    }

    /// Count one probe evaluation; true when a record should be kept.
    #[inline]
    pub fn tick(&mut self) -> bool {
        let fire = self.counter % self.interval == 0;
        self.counter = self.counter.wrapping_add(1);
        fire
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_in_insertion_order() {
        let mut q = TelemetryQueue::new(10_000);
        for i in 0..10_000 {
            q.push(1, 0.0, i as f32, 0.0);
        }
        assert_eq!(q.count(), 0);
        let payloads: Vec<f32> = q.snapshot().iter().map(|m| m.payload).collect();
        assert!(payloads.iter().enumerate().all(|(i, &p)| p == i as f32));
    }

    #[test]
    fn overwrites_oldest_after_wrap() {
        let mut q = TelemetryQueue::new(10_000);
        for i in 1..=10_001 {
            q.push(1, 0.0, i as f32, 0.0);
        }
        assert_eq!(q.count(), 1);
        assert_eq!(q.snapshot()[0].payload, 10_001.0);
        let ordered: Vec<f32> = q.chronological().map(|m| m.payload).collect();
        assert_eq!(ordered.len(), 10_000);
        assert_eq!(ordered[0], 2.0);
        assert_eq!(ordered[9_999], 10_001.0);
    }

    #[test]
    fn clear_keeps_contents() {
        let mut q = TelemetryQueue::new(4);
        q.push(3, 0.0, 7.0, 0.0);
        q.clear();
        assert_eq!(q.count(), 0);
        assert_eq!(q.snapshot()[0].payload, 7.0);
        assert_eq!(q.chronological().count(), 0);
    }

    #[test]
    fn decimator_fires_every_interval() {
        let mut d = Decimator::new(97);
        let fired: Vec<usize> = (0..300).filter(|_| d.tick()).collect();
        assert_eq!(fired, vec![0, 97, 194, 291]);
        let mut d = Decimator::new(3);
        let pattern: Vec<bool> = (0..6).map(|_| d.tick()).collect();
        assert_eq!(pattern, vec![true, false, false, true, false, false]);
    }
}
