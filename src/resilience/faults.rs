//! Fault injection decision.

/// Whether a configured forced status fires for one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FaultRoll {
    /// No probability configured: the fault always fires.
    Always,
    /// Fires with the given probability, `0.0..=1.0`.
    Chance(f64),
}

impl FaultRoll {
    pub fn new(probability: Option<f64>) -> Self {
        match probability {
            None => FaultRoll::Always,
            Some(p) => FaultRoll::Chance(p.clamp(0.0, 1.0)),
        }
    }

    pub fn fires(&self) -> bool {
        match *self {
            FaultRoll::Always => true,
            FaultRoll::Chance(p) if p >= 1.0 => true,
            FaultRoll::Chance(p) if p <= 0.0 => false,
            FaultRoll::Chance(p) => fastrand::f64() < p,
        }
    }
}
