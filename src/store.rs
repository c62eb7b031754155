//! Parameter memory: one flat scalar array holding host controls, per-voice
//! state, the delay-line planes and the shared smoothing state.
//!
//! Offsets are fixed by [`MemoryLayout`]. The host may only write the control
//! region (through [`ParameterStore::set_parameter`]) and the delay planes
//! (through [`ParameterStore::bulk_load`]); every other word is engine-private.

use crate::invariant_ppt::{assert_invariant, LAYOUT_DISJOINT};
use crate::VOICE_COUNT;
use std::fmt;
use std::ops::Range;

/// Engine ramp A: counts the latched click level since the last click.
pub const CLICK_RAMP_SLOT: usize = 0;
/// Latched click level.
pub const CLICK_LATCH_SLOT: usize = 2;
/// Engine ramp B: transport position.
pub const TRANSPORT_SLOT: usize = 3;
/// Previous phasor output, for edge detection.
pub const PHASOR_HISTORY_SLOT: usize = 10;
/// Phasor accumulator.
pub const PHASOR_SLOT: usize = 14;
/// Previous ramp-to-trigger comparison.
pub const EDGE_HISTORY_SLOT: usize = 15;

/// End of the control region (exclusive).
pub const CONTROL_REGION_END: usize = 30;
/// Voice phase words, one per voice.
pub const VOICE_PHASE_BASE: usize = 30;
/// Latched voice playhead words, one per voice.
pub const VOICE_PLAYHEAD_BASE: usize = 95;
/// First word of the delay-line planes.
pub const DELAY_BASE: usize = 100;
/// Unused words between the delay planes and the tail state.
const TAIL_GAP: usize = 170;

/// Host control parameters and their fixed slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    /// One-shot click level; cleared by the engine after it is read.
    Click,
    PlaybackSpeed,
    /// Tempo in beats per minute.
    Tempo,
    RateBase,
    /// Exponent applied to the base rate: `rate = base * 2^octaves`.
    RateOctaves,
    /// Gate window length, in thousandths of a bar division.
    GateLength,
    /// Loop length in samples.
    LoopLength,
    DensityRate,
    DensityScale,
    PositionStep,
    PositionSteps,
    PositionOffset,
    PositionBlend,
    PositionSpread,
    /// Blend between the edge fade and the raised-cosine window.
    FadeBlend,
    /// Edge fade width control; the fade spans `clamp(1 - x, 0, 1)`.
    FadeWidth,
    /// Values above 0.5 play grains backwards.
    Reverse,
    /// Envelope apex position in [0, 1].
    EnvelopePeak,
    /// Grain transposition in semitones.
    Semitones,
    GrainSize,
}

impl Param {
    /// Every host parameter, in slot order.
    pub const ALL: [Param; 20] = [
        Param::Click,
        Param::PlaybackSpeed,
        Param::Tempo,
        Param::RateBase,
        Param::RateOctaves,
        Param::GateLength,
        Param::LoopLength,
        Param::DensityRate,
        Param::DensityScale,
        Param::PositionStep,
        Param::PositionSteps,
        Param::PositionOffset,
        Param::PositionBlend,
        Param::PositionSpread,
        Param::FadeBlend,
        Param::FadeWidth,
        Param::Reverse,
        Param::EnvelopePeak,
        Param::Semitones,
        Param::GrainSize,
    ];

    /// Memory slot of this parameter.
    pub const fn index(self) -> usize {
        match self {
            Param::Click => 1,
            Param::PlaybackSpeed => 4,
            Param::Tempo => 5,
            Param::RateBase => 6,
            Param::RateOctaves => 7,
            Param::GateLength => 8,
            Param::LoopLength => 9,
            Param::DensityRate => 11,
            Param::DensityScale => 12,
            Param::PositionStep => 16,
            Param::PositionSteps => 17,
            Param::PositionOffset => 18,
            Param::PositionBlend => 19,
            Param::PositionSpread => 20,
            Param::FadeBlend => 21,
            Param::FadeWidth => 22,
            Param::Reverse => 24,
            Param::EnvelopePeak => 25,
            Param::Semitones => 27,
            Param::GrainSize => 28,
        }
    }

    /// Parameter stored at `index`, if any.
    pub fn from_index(index: usize) -> Option<Param> {
        Param::ALL.iter().copied().find(|p| p.index() == index)
    }

    /// Value loaded by [`ParameterStore::load_default_controls`].
    pub fn default_value(self) -> f32 {
        match self {
            Param::Click => 0.0,
            Param::PlaybackSpeed => 1.0,
            Param::Tempo => 120.0,
            Param::RateBase => 1.0,
            Param::RateOctaves => 0.0,
            Param::GateLength => 1000.0,
            Param::LoopLength => 44100.0,
            Param::DensityRate => 1.0,
            Param::DensityScale => 1.0,
            Param::PositionStep => 0.0,
            Param::PositionSteps => 1.0,
            Param::PositionOffset => 0.0,
            Param::PositionBlend => 0.0,
            Param::PositionSpread => 0.0,
            Param::FadeBlend => 0.5,
            Param::FadeWidth => 0.5,
            Param::Reverse => 0.0,
            Param::EnvelopePeak => 0.5,
            Param::Semitones => 0.0,
            Param::GrainSize => 0.1,
        }
    }
}

/// Index map of parameter memory for a given delay capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    loop_capacity: usize,
}

impl MemoryLayout {
    /// Build the layout for delay planes of `loop_capacity` samples each.
    pub fn new(loop_capacity: usize) -> Self {
        let layout = Self { loop_capacity };
        assert_invariant(
            LAYOUT_DISJOINT,
            layout.regions_disjoint(),
            "memory regions overlap",
            Some("MemoryLayout::new"),
        );
        layout
    }

    /// Samples per delay channel plane.
    pub fn loop_capacity(&self) -> usize {
        self.loop_capacity
    }

    /// Delay plane for `channel` (0 or 1).
    pub fn delay_plane(&self, channel: usize) -> Range<usize> {
        let start = DELAY_BASE + channel * self.loop_capacity;
        start..start + self.loop_capacity
    }

    /// Both delay planes as one range.
    pub fn delay_region(&self) -> Range<usize> {
        DELAY_BASE..DELAY_BASE + 2 * self.loop_capacity
    }

    fn tail_base(&self) -> usize {
        self.delay_region().end + TAIL_GAP
    }

    /// Slot of the phase of `voice`.
    pub fn voice_phase(&self, voice: usize) -> usize {
        VOICE_PHASE_BASE + voice
    }

    /// Slot of the latched playhead of `voice`.
    pub fn voice_playhead(&self, voice: usize) -> usize {
        VOICE_PLAYHEAD_BASE + voice
    }

    /// Slot of the latched pitch ratio of `voice`.
    pub fn voice_pitch(&self, voice: usize) -> usize {
        self.tail_base() + voice
    }

    /// Slot of the phase accumulator of `voice`.
    pub fn voice_accumulator(&self, voice: usize) -> usize {
        self.tail_base() + VOICE_COUNT + voice
    }

    /// Slot of the shared smoothing filter state.
    pub fn filter_state(&self) -> usize {
        self.tail_base() + 2 * VOICE_COUNT
    }

    /// Total words of memory.
    pub fn size(&self) -> usize {
        self.filter_state() + 1
    }

    fn regions_disjoint(&self) -> bool {
        let mut regions = vec![
            0..CONTROL_REGION_END,
            self.voice_phase(0)..self.voice_phase(VOICE_COUNT),
            self.voice_playhead(0)..self.voice_playhead(VOICE_COUNT),
            self.delay_region(),
            self.voice_pitch(0)..self.voice_pitch(VOICE_COUNT),
            self.voice_accumulator(0)..self.voice_accumulator(VOICE_COUNT),
            self.filter_state()..self.size(),
        ];
        regions.sort_by_key(|r| r.start);
        regions.windows(2).all(|w| w[0].end <= w[1].start)
    }
}

/// Persistent state of one grain voice.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VoiceRecord {
    /// Normalized grain phase in [0, 1).
    pub phase: f32,
    /// Playback-rate multiplier latched at the last retrigger.
    pub pitch_ratio: f32,
    /// Delay-line offset latched at the last retrigger.
    pub playhead: f32,
    /// Free-running sample accumulator.
    pub accumulator: f32,
}

/// Rejected host writes.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Index is outside the host control region or not a control slot.
    NotHostWritable(usize),
    /// Index is past the end of memory.
    OutOfRange(usize),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotHostWritable(i) => write!(f, "slot {} is not host-writable", i),
            StoreError::OutOfRange(i) => write!(f, "slot {} is out of range", i),
        }
    }
}

/// Flat parameter memory with typed accessors.
#[derive(Debug, Clone)]
pub struct ParameterStore {
    memory: Vec<f32>,
    layout: MemoryLayout,
}

impl ParameterStore {
    /// Allocate zeroed memory for `layout`.
    pub fn new(layout: MemoryLayout) -> Self {
        Self {
            memory: vec![0.0; layout.size()],
            layout,
        }
    }

    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    /// Total words of memory.
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    /// Raw read. Panics past the end of memory.
    #[inline]
    pub fn get(&self, index: usize) -> f32 {
        self.memory[index]
    }

    /// Raw write. Panics past the end of memory.
    #[inline]
    pub fn set(&mut self, index: usize, value: f32) {
        self.memory[index] = value;
    }

    #[inline]
    pub fn read(&self, param: Param) -> f32 {
        self.memory[param.index()]
    }

    #[inline]
    pub fn write(&mut self, param: Param, value: f32) {
        self.memory[param.index()] = value;
    }

    /// Host write of one control slot.
    pub fn set_parameter(&mut self, index: usize, value: f32) -> Result<(), StoreError> {
        if index >= self.memory.len() {
            return Err(StoreError::OutOfRange(index));
        }
        if Param::from_index(index).is_none() && !is_reserved_control(index) {
            return Err(StoreError::NotHostWritable(index));
        }
        self.memory[index] = value;
        Ok(())
    }

    /// Host write of a contiguous range, clamped to the end of memory.
    /// Returns the number of words written.
    pub fn bulk_load(&mut self, index: usize, data: &[f32]) -> usize {
        if index >= self.memory.len() {
            return 0;
        }
        let n = data.len().min(self.memory.len() - index);
        self.memory[index..index + n].copy_from_slice(&data[..n]);
        n
    }

    /// Write every control parameter's default value.
    pub fn load_default_controls(&mut self) {
        for param in Param::ALL {
            self.write(param, param.default_value());
        }
    }

    /// Load the persistent state of `voice`.
    pub fn voice(&self, voice: usize) -> VoiceRecord {
        debug_assert!(voice < VOICE_COUNT);
        VoiceRecord {
            phase: self.memory[self.layout.voice_phase(voice)],
            pitch_ratio: self.memory[self.layout.voice_pitch(voice)],
            playhead: self.memory[self.layout.voice_playhead(voice)],
            accumulator: self.memory[self.layout.voice_accumulator(voice)],
        }
    }

    /// Persist the state of `voice`.
    pub fn store_voice(&mut self, voice: usize, record: &VoiceRecord) {
        debug_assert!(voice < VOICE_COUNT);
        self.memory[self.layout.voice_phase(voice)] = record.phase;
        self.memory[self.layout.voice_pitch(voice)] = record.pitch_ratio;
        self.memory[self.layout.voice_playhead(voice)] = record.playhead;
        self.memory[self.layout.voice_accumulator(voice)] = record.accumulator;
    }

    pub fn filter_state(&self) -> f32 {
        self.memory[self.layout.filter_state()]
    }

    pub fn set_filter_state(&mut self, value: f32) {
        let slot = self.layout.filter_state();
        self.memory[slot] = value;
    }

    /// Delay planes, read-only.
    pub fn delay(&self) -> &[f32] {
        &self.memory[self.layout.delay_region()]
    }

    /// Write one recorded sample. Returns false when `channel` or `index`
    /// falls outside the delay planes.
    pub fn write_delay(&mut self, channel: usize, index: usize, value: f32) -> bool {
        if channel >= crate::CHANNELS || index >= self.layout.loop_capacity() {
            return false;
        }
        let slot = self.layout.delay_plane(channel).start + index;
        self.memory[slot] = value;
        true
    }
}

/// Control slots the patch never reads but the host may still write.
fn is_reserved_control(index: usize) -> bool {
    matches!(index, 23 | 26 | 29)
}
