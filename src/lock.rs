use std::sync::{Mutex, MutexGuard};

/// Take a lock even if a previous holder panicked; the guarded data stays usable.
pub(crate) fn lock_or_recover<'a, T>(lock: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!(context, "mutex poisoned; recovering");
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn recovers_after_panicking_holder() {
        let shared = Arc::new(Mutex::new(7u32));
        let clone = shared.clone();
        let _ = thread::spawn(move || {
            let _guard = clone.lock().unwrap();
            panic!("holder panics");
        })
        .join();
        assert!(shared.is_poisoned());
        let mut guard = lock_or_recover(&shared, "test");
        *guard += 1;
        assert_eq!(*guard, 8);
    }
}
