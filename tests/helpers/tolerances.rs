//! Tolerance constants for training and rendering tests.

/// Peak below which a rendered clip counts as near-silent (-20 dBFS,
/// against a -6 dBFS reference tone).
pub const NEAR_SILENCE_PEAK: f32 = 0.1;

/// Peak of a component that must be exactly silent up to float rounding.
pub const EXACT_SILENCE_PEAK: f32 = 1e-6;
