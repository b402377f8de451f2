//! Platform capability traits
//!
//! The flow orchestrator depends on randomness and navigation only through
//! these narrow contracts, which keeps the protocol logic deterministic and
//! fully testable in memory. The durable store counterpart lives in
//! `crate::store`.

use crate::error::AuthError;

/// Cryptographically secure randomness
pub trait RandomSource: Send + Sync {
    /// Fill `dest` with random bytes, or fail if no secure source exists
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<(), AuthError>;
}

/// Operating-system CSPRNG
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<(), AuthError> {
        use rand::TryRngCore;

        rand::rngs::OsRng
            .try_fill_bytes(dest)
            .map_err(|e| AuthError::Random(e.to_string()))
    }
}

/// Full-page navigation, the non-returning redirect of the original flow
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &str) -> Result<(), AuthError>;
}

/// Opens URLs in the system default browser
pub struct BrowserNavigator;

impl Navigator for BrowserNavigator {
    fn navigate(&self, url: &str) -> Result<(), AuthError> {
        open::that(url).map_err(|e| AuthError::Navigation(e.to_string()))
    }
}

#[cfg(test)]
pub mod testing {
    use parking_lot::Mutex;

    use super::*;

    /// Deterministic byte source cycling over a fixed pattern
    pub struct FixedRandom(pub u8);

    impl RandomSource for FixedRandom {
        fn fill_bytes(&self, dest: &mut [u8]) -> Result<(), AuthError> {
            for (i, byte) in dest.iter_mut().enumerate() {
                *byte = self.0.wrapping_add(i as u8);
            }
            Ok(())
        }
    }

    /// Random source that always fails, for the no-entropy path
    pub struct BrokenRandom;

    impl RandomSource for BrokenRandom {
        fn fill_bytes(&self, _dest: &mut [u8]) -> Result<(), AuthError> {
            Err(AuthError::Random("entropy source unavailable".to_string()))
        }
    }

    /// Navigator that records the URLs it was asked to visit
    #[derive(Default)]
    pub struct RecordingNavigator {
        pub visited: Mutex<Vec<String>>,
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, url: &str) -> Result<(), AuthError> {
            self.visited.lock().push(url.to_string());
            Ok(())
        }
    }
}
