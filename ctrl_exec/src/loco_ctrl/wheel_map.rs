//! Mapping between wheel order and motor channel order

use super::{LocoCtrlError, NUM_WHEELS};

/// A permutation taking wheel order (front-left, front-right, rear-left, rear-right) to the order
/// of the motor channels.
///
/// The motor channel `i` carries wheel `map[i]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WheelMap {
    map: [usize; NUM_WHEELS]
}

impl WheelMap {
    /// Build the map, which must be a permutation of `0..4`.
    pub fn new(map: [usize; NUM_WHEELS]) -> Result<Self, LocoCtrlError> {
        let mut seen = [false; NUM_WHEELS];

        for &wheel in map.iter() {
            if wheel >= NUM_WHEELS || seen[wheel] {
                return Err(LocoCtrlError::InvalidWheelMap(map))
            }
            seen[wheel] = true;
        }

        Ok(Self { map })
    }

    /// Reorder values given in wheel order into channel order.
    pub fn apply<T: Copy>(&self, wheels: &[T; NUM_WHEELS]) -> [T; NUM_WHEELS] {
        let mut channels = *wheels;
        for (channel, &wheel) in self.map.iter().enumerate() {
            channels[channel] = wheels[wheel];
        }
        channels
    }

    /// The map going from channel order back to wheel order.
    pub fn inverse(&self) -> Self {
        let mut inv = [0; NUM_WHEELS];
        for (channel, &wheel) in self.map.iter().enumerate() {
            inv[wheel] = channel;
        }
        Self { map: inv }
    }

    pub fn as_array(&self) -> [usize; NUM_WHEELS] {
        self.map
    }
}

impl Default for WheelMap {
    /// The rover's wiring: channel 0 rear-left, 1 rear-right, 2 front-right, 3 front-left.
    fn default() -> Self {
        Self { map: [2, 3, 1, 0] }
    }
}
