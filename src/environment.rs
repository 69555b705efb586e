//! Process-wide environment helpers.
//!
//! Provides synchronised wrappers around environment mutations so scenarios
//! and runtime code serialise access through a shared mutex.

use std::env;
use std::ffi::{OsStr, OsString};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
static SCENARIO_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn lock() -> MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Set an environment variable while holding the global lock.
///
/// Environment variables are global to the process; without coordination these
/// operations are racy.
pub fn set_var<K: AsRef<OsStr>, V: AsRef<OsStr>>(key: K, value: V) {
    let _guard = lock();
    // SAFETY: the mutex serialises access to the unsynchronised std env calls.
    unsafe { env::set_var(key, value) };
}

/// Remove an environment variable while holding the global lock.
pub fn remove_var<K: AsRef<OsStr>>(key: K) {
    let _guard = lock();
    // SAFETY: the mutex serialises access to the unsynchronised std env calls.
    unsafe { env::remove_var(key) };
}

/// Read an environment variable while holding the global lock.
///
/// # Errors
///
/// Returns [`env::VarError`] when the variable is unset or contains invalid
/// Unicode.
pub fn var<K: AsRef<OsStr>>(key: K) -> Result<String, env::VarError> {
    let _guard = lock();
    env::var(key)
}

/// Run `op` while the environment mutex is held.
pub fn with_lock<T, F>(op: F) -> T
where
    F: FnOnce() -> T,
{
    let _guard = lock();
    op()
}

/// Serialise whole scenarios that mutate the environment.
///
/// Distinct from the per-call lock above: the returned guard is held for a
/// full set-run-restore cycle while the code under test still reads the
/// environment through [`var`].
pub fn scenario_lock() -> MutexGuard<'static, ()> {
    SCENARIO_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// RAII guard that restores captured environment variables on drop.
///
/// Restoration also runs while unwinding, so a panicking scenario leaves the
/// environment as it found it.
#[derive(Debug)]
pub struct EnvGuard {
    entries: Vec<(OsString, Option<OsString>)>,
}

impl EnvGuard {
    /// Apply `pairs`, removing keys mapped to `None`, and remember the prior
    /// values.
    pub fn apply<K, V>(pairs: impl IntoIterator<Item = (K, Option<V>)>) -> Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        let mut entries = Vec::new();
        for (key, value) in pairs {
            let key = key.as_ref().to_os_string();
            let previous = with_lock(|| env::var_os(&key));
            match value {
                Some(val) => set_var(&key, val),
                None => remove_var(&key),
            }
            entries.push((key, previous));
        }
        Self { entries }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        // Reverse order so a key applied twice ends at its original value.
        for (key, value) in self.entries.iter_mut().rev() {
            match value.take() {
                Some(val) => set_var(&*key, val),
                None => remove_var(&*key),
            }
        }
    }
}
