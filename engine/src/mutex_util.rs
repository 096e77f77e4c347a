use std::sync::{Mutex, MutexGuard};

/// Locks the given mutex, returning the guard even if the mutex is poisoned.
///
/// A panic on the tick thread must not take the whole engine down with it; the shared state is
/// a plain value type and stays usable.
pub fn recovering_lock<T>(mutex: &Mutex<T>) -> MutexGuard<T> {
    match mutex.lock() {
        Ok(g) => g,
        Err(e) => e.into_inner(),
    }
}
