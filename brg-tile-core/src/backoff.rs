// Copyright 2022 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use brg_tile_interface::BackoffConfig;

/// Busy-wait lengths between completion polls: starts at `initial` and
/// doubles after every wait until it reaches `max`, then stays there.
#[derive(Clone, Debug)]
pub struct Backoff {
    next: u32,
    max: u32,
}
impl Backoff {
    pub fn new(config: &BackoffConfig) -> Self {
        Self {
            next: config.initial.clamp(1, config.max.max(1)),
            max: config.max.max(1),
        }
    }

    /// True once the wait length has stopped growing.
    pub fn is_capped(&self) -> bool { self.next >= self.max }
}
impl Iterator for Backoff {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let current = self.next;
        if self.next < self.max {
            self.next = self.next.saturating_mul(2).min(self.max);
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_then_caps() {
        let waits: Vec<u32> = Backoff::new(&BackoffConfig::DEFAULT).take(10).collect();
        assert_eq!(waits, [2, 4, 8, 16, 32, 64, 128, 256, 256, 256]);
    }

    #[test]
    fn never_exceeds_cap() {
        let mut backoff = Backoff::new(&BackoffConfig::DEFAULT);
        assert!(!backoff.is_capped());
        assert!(backoff.by_ref().take(1000).all(|n| n <= 256));
        assert!(backoff.is_capped());
    }

    /// A zero start would never grow; it is bumped to one.
    #[test]
    fn zero_initial() {
        let config = BackoffConfig { initial: 0, max: 4 };
        let waits: Vec<u32> = Backoff::new(&config).take(4).collect();
        assert_eq!(waits, [1, 2, 4, 4]);
    }

    #[test]
    fn odd_bounds() {
        let config = BackoffConfig { initial: 3, max: 20 };
        let waits: Vec<u32> = Backoff::new(&config).take(5).collect();
        assert_eq!(waits, [3, 6, 12, 20, 20]);
    }
}
