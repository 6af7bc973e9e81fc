//! Keyframe policy: when to store a full snapshot instead of a delta.

/// Why a keyframe was chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyframeReason {
    /// The journal is empty.
    FirstEntry,
    /// `interval` turns have passed since the last keyframe.
    Interval,
    /// The delta would cost more than `size_threshold` keyframes.
    DeltaTooLarge,
    /// The previous turn could not be materialized, so no delta base exists.
    Rebase,
}

/// Outcome of a policy check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyframeDecision {
    Keyframe(KeyframeReason),
    Delta,
}

impl KeyframeDecision {
    pub fn is_keyframe(self) -> bool {
        matches!(self, KeyframeDecision::Keyframe(_))
    }
}

/// Deltas smaller than this never trigger the size override.
pub const DEFAULT_MIN_OVERRIDE_BYTES: usize = 1024;

/// Pure decision function parameterised by the keyframe interval `K` and the
/// delta size threshold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyframePolicy {
    interval: u64,
    size_threshold: f64,
    min_override_bytes: usize,
}

impl KeyframePolicy {
    /// An interval of 0 is treated as 1 (every turn is a keyframe).
    pub fn new(interval: u64, size_threshold: f64) -> Self {
        Self {
            interval: interval.max(1),
            size_threshold,
            min_override_bytes: DEFAULT_MIN_OVERRIDE_BYTES,
        }
    }

    /// Floor below which a delta is always cheap enough. On small states the
    /// fixed per-operation overhead of a patch can exceed the snapshot itself.
    pub fn with_min_override_bytes(mut self, bytes: usize) -> Self {
        self.min_override_bytes = bytes;
        self
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn size_threshold(&self) -> f64 {
        self.size_threshold
    }

    pub fn min_override_bytes(&self) -> usize {
        self.min_override_bytes
    }

    /// Decide for `turn`.
    ///
    /// `last_keyframe_turn` is `None` when the journal is empty.
    /// `delta_size_bytes` is `None` when no candidate delta has been computed;
    /// the size override is then skipped. The override only fires for deltas
    /// of at least [`min_override_bytes`](Self::min_override_bytes).
    pub fn decide(
        &self,
        turn: u64,
        last_keyframe_turn: Option<u64>,
        delta_size_bytes: Option<usize>,
        last_keyframe_size_bytes: usize,
    ) -> KeyframeDecision {
        let Some(last_keyframe_turn) = last_keyframe_turn else {
            return KeyframeDecision::Keyframe(KeyframeReason::FirstEntry);
        };

        if turn.saturating_sub(last_keyframe_turn) >= self.interval {
            return KeyframeDecision::Keyframe(KeyframeReason::Interval);
        }

        if let Some(delta_size) = delta_size_bytes {
            if delta_size >= self.min_override_bytes
                && delta_size as f64 > self.size_threshold * last_keyframe_size_bytes as f64
            {
                return KeyframeDecision::Keyframe(KeyframeReason::DeltaTooLarge);
            }
        }

        KeyframeDecision::Delta
    }

    /// Boolean view of [`decide`](Self::decide).
    ///
    /// A keyframe is due when the journal is empty, when `interval` turns have
    /// passed, or when the delta exceeds `size_threshold` times the last
    /// keyframe's size. With the default floor ([`DEFAULT_MIN_OVERRIDE_BYTES`])
    /// deltas smaller than that floor never count as too large, whatever the
    /// keyframe size. Build the policy with `with_min_override_bytes(0)` for
    /// the bare size comparison.
    pub fn should_keyframe(
        &self,
        turn: u64,
        last_keyframe_turn: Option<u64>,
        last_delta_size_bytes: usize,
        last_keyframe_size_bytes: usize,
    ) -> bool {
        self.decide(
            turn,
            last_keyframe_turn,
            Some(last_delta_size_bytes),
            last_keyframe_size_bytes,
        )
        .is_keyframe()
    }
}

impl Default for KeyframePolicy {
    fn default() -> Self {
        Self::new(10, 1.0)
    }
}
