//! Session lock state machine.
//!
//! The session is the one piece of shared mutable state in the
//! subsystem: an in-memory cache of the unwrapped data key and (when
//! known) the master password. It is either `Locked` — the initial
//! state, and the state after an explicit [`Session::lock`] or an idle
//! timeout — or `Unlocked`.
//!
//! Transitions:
//! - `Locked → Unlocked` only through [`Session::unlock_with`]
//!   (successful setup, unlock, or recovery). A failed unlock attempt
//!   never transitions — the session simply stays `Locked`.
//! - `Unlocked → Locked` through [`Session::lock`] or by the idle
//!   deadline passing. Both synchronously drop the cached key and
//!   password (zeroized on drop) with no grace period.
//!
//! The idle timeout is a single-shot deadline (`last_activity +
//! idle_timeout`), reset by every qualifying access while unlocked and
//! cancelled by `lock()`. Expiry is enforced on access: any key read
//! past the deadline clears the state and reports [`VaultError::KeyLocked`].
//! Hosts that want eager locking can additionally poll
//! [`Session::expire_if_idle`] from a timer thread.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use coffre_crypto_core::memory::{SecretBuffer, SecretBytes};
use tracing::debug;

use crate::error::VaultError;

/// Default idle timeout before an unlocked session locks itself.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// Session construction options.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Idle time after which the session locks itself.
    pub idle_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Lock state — `Unlocked` carries the cached material.
enum LockState {
    Locked,
    Unlocked {
        data_key: SecretBytes<32>,
        /// Absent when the session was opened through phrase recovery.
        master_password: Option<SecretBuffer>,
        last_activity: Instant,
    },
}

/// In-memory session cache with idle-timeout eviction.
///
/// Owned by the caller and passed into every operation that needs the
/// key — there is no hidden global. Single-writer discipline: only the
/// key manager and the session itself mutate the state.
pub struct Session {
    state: Mutex<LockState>,
    idle_timeout: Duration,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = if self.is_unlocked() { "unlocked" } else { "locked" };
        write!(f, "Session({state})")
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl Session {
    /// Create a session in the `Locked` state.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            state: Mutex::new(LockState::Locked),
            idle_timeout: config.idle_timeout,
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Transition to `Unlocked`, replacing any previous cached material.
    pub fn unlock_with(&self, data_key: SecretBytes<32>, master_password: Option<SecretBuffer>) {
        let mut state = self.lock_state();
        *state = LockState::Unlocked {
            data_key,
            master_password,
            last_activity: Instant::now(),
        };
        debug!("session unlocked");
    }

    /// Transition to `Locked`, synchronously dropping the cached key
    /// and password. Idempotent.
    pub fn lock(&self) {
        let mut state = self.lock_state();
        if matches!(*state, LockState::Unlocked { .. }) {
            debug!("session locked");
        }
        *state = LockState::Locked;
    }

    /// Returns `true` while the session is `Unlocked` and the idle
    /// deadline has not passed. Does not count as activity.
    #[must_use]
    pub fn is_unlocked(&self) -> bool {
        let state = self.lock_state();
        match *state {
            LockState::Unlocked { last_activity, .. } => {
                last_activity.elapsed() < self.idle_timeout
            }
            LockState::Locked => false,
        }
    }

    /// Record qualifying user activity, resetting the idle deadline.
    pub fn touch(&self) {
        let mut state = self.lock_state();
        if let LockState::Unlocked {
            ref mut last_activity,
            ..
        } = *state
        {
            *last_activity = Instant::now();
        }
    }

    /// Lock the session if the idle deadline has passed. Returns `true`
    /// if this call performed the transition.
    pub fn expire_if_idle(&self) -> bool {
        let mut state = self.lock_state();
        if let LockState::Unlocked { last_activity, .. } = *state {
            if last_activity.elapsed() >= self.idle_timeout {
                *state = LockState::Locked;
                debug!("session locked by idle timeout");
                return true;
            }
        }
        false
    }

    /// Copy out the cached data key. Counts as qualifying activity.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::KeyLocked`] if the session is locked or the
    /// idle deadline has passed (in which case the state is cleared
    /// before returning).
    pub fn data_key(&self) -> Result<SecretBytes<32>, VaultError> {
        let mut state = self.lock_state();
        match *state {
            LockState::Unlocked {
                ref data_key,
                last_activity,
                ..
            } => {
                if last_activity.elapsed() >= self.idle_timeout {
                    *state = LockState::Locked;
                    debug!("session locked by idle timeout");
                    return Err(VaultError::KeyLocked);
                }
                let key = data_key.duplicate();
                if let LockState::Unlocked {
                    ref mut last_activity,
                    ..
                } = *state
                {
                    *last_activity = Instant::now();
                }
                Ok(key)
            }
            LockState::Locked => Err(VaultError::KeyLocked),
        }
    }

    /// Copy out the cached master password, if the session holds one.
    /// Counts as qualifying activity.
    ///
    /// Returns `Ok(None)` for a session opened through phrase recovery,
    /// which never saw the password.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::KeyLocked`] if the session is locked or
    /// idle-expired.
    pub fn master_password(&self) -> Result<Option<SecretBuffer>, VaultError> {
        let mut state = self.lock_state();
        match *state {
            LockState::Unlocked {
                ref master_password,
                last_activity,
                ..
            } => {
                if last_activity.elapsed() >= self.idle_timeout {
                    *state = LockState::Locked;
                    debug!("session locked by idle timeout");
                    return Err(VaultError::KeyLocked);
                }
                let password = master_password.as_ref().map(SecretBuffer::duplicate);
                if let LockState::Unlocked {
                    ref mut last_activity,
                    ..
                } = *state
                {
                    *last_activity = Instant::now();
                }
                Ok(password)
            }
            LockState::Locked => Err(VaultError::KeyLocked),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> SecretBytes<32> {
        SecretBytes::new([0x42; 32])
    }

    #[test]
    fn starts_locked() {
        let session = Session::default();
        assert!(!session.is_unlocked());
        assert!(matches!(session.data_key(), Err(VaultError::KeyLocked)));
    }

    #[test]
    fn unlock_then_read_key() {
        let session = Session::default();
        session.unlock_with(test_key(), Some(SecretBuffer::from("pw")));
        assert!(session.is_unlocked());
        let key = session.data_key().expect("key should be cached");
        assert_eq!(key.expose(), &[0x42; 32]);
        let password = session
            .master_password()
            .expect("session should be unlocked")
            .expect("password should be cached");
        assert_eq!(password.expose(), b"pw");
    }

    #[test]
    fn lock_clears_state() {
        let session = Session::default();
        session.unlock_with(test_key(), None);
        session.lock();
        assert!(!session.is_unlocked());
        assert!(matches!(session.data_key(), Err(VaultError::KeyLocked)));
        assert!(matches!(
            session.master_password(),
            Err(VaultError::KeyLocked)
        ));
    }

    #[test]
    fn lock_is_idempotent() {
        let session = Session::default();
        session.lock();
        session.lock();
        assert!(!session.is_unlocked());
    }

    #[test]
    fn recovery_session_has_no_password() {
        let session = Session::default();
        session.unlock_with(test_key(), None);
        let password = session
            .master_password()
            .expect("session should be unlocked");
        assert!(password.is_none());
    }

    #[test]
    fn idle_deadline_locks_on_access() {
        let session = Session::new(SessionConfig {
            idle_timeout: Duration::from_millis(1),
        });
        session.unlock_with(test_key(), None);
        std::thread::sleep(Duration::from_millis(10));
        assert!(matches!(session.data_key(), Err(VaultError::KeyLocked)));
        // State was cleared, not merely hidden.
        assert!(!session.is_unlocked());
    }

    #[test]
    fn touch_resets_the_deadline() {
        let session = Session::new(SessionConfig {
            idle_timeout: Duration::from_millis(50),
        });
        session.unlock_with(test_key(), None);
        for _ in 0..4 {
            std::thread::sleep(Duration::from_millis(20));
            session.touch();
        }
        // 80ms of wall time, but never 50ms idle.
        assert!(session.data_key().is_ok());
    }

    #[test]
    fn expire_if_idle_reports_transition() {
        let session = Session::new(SessionConfig {
            idle_timeout: Duration::from_millis(1),
        });
        session.unlock_with(test_key(), None);
        std::thread::sleep(Duration::from_millis(10));
        assert!(session.expire_if_idle());
        assert!(!session.expire_if_idle(), "already locked");
    }

    #[test]
    fn relock_then_unlock_again() {
        let session = Session::default();
        session.unlock_with(test_key(), None);
        session.lock();
        session.unlock_with(SecretBytes::new([0x17; 32]), None);
        let key = session.data_key().expect("key should be cached");
        assert_eq!(key.expose(), &[0x17; 32]);
    }
}
