//! Termination signals delivered synchronously to a dedicated thread.
//!
//! The set is blocked on the main thread before any other thread starts, so every
//! thread inherits the mask and only the signal thread ever sees the signals.

use crate::dispatcher::ControlMessage;
use crossbeam_channel::Sender;
use std::io;
use std::mem;
use std::ptr;
use std::thread::{self, JoinHandle};

#[derive(Clone, Copy)]
pub struct SignalSet {
    set: libc::sigset_t,
}

impl SignalSet {
    /// SIGINT, SIGTERM, and SIGHUP.
    pub fn termination() -> io::Result<Self> {
        Self::from_signals(&[libc::SIGINT, libc::SIGTERM, libc::SIGHUP])
    }

    pub fn from_signals(signals: &[libc::c_int]) -> io::Result<Self> {
        // SAFETY: sigset_t is a plain C struct; sigemptyset initializes it before use.
        let mut set: libc::sigset_t = unsafe { mem::zeroed() };
        unsafe {
            if libc::sigemptyset(&mut set) != 0 {
                return Err(io::Error::last_os_error());
            }
            for &signal in signals {
                if libc::sigaddset(&mut set, signal) != 0 {
                    return Err(io::Error::last_os_error());
                }
            }
        }
        Ok(Self { set })
    }

    /// Block the set on the calling thread (and every thread it spawns afterwards).
    pub fn block(&self) -> io::Result<()> {
        // SAFETY: `self.set` was initialized by sigemptyset/sigaddset.
        let rc = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, &self.set, ptr::null_mut()) };
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        Ok(())
    }

    /// Wait for one signal in the set. The set must already be blocked.
    pub fn wait(&self) -> io::Result<libc::c_int> {
        let mut signal: libc::c_int = 0;
        // SAFETY: both pointers reference live, initialized values.
        let rc = unsafe { libc::sigwait(&self.set, &mut signal) };
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        Ok(signal)
    }
}

fn signal_name(signal: libc::c_int) -> &'static str {
    match signal {
        libc::SIGINT => "SIGINT",
        libc::SIGTERM => "SIGTERM",
        libc::SIGHUP => "SIGHUP",
        _ => "signal",
    }
}

/// Turn the first delivered signal into a [`ControlMessage::Shutdown`].
pub fn spawn_signal_thread(
    signals: SignalSet,
    tx: Sender<ControlMessage>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || match signals.wait() {
            Ok(signal) => {
                tracing::info!(signal = signal_name(signal), "shutdown requested");
                let _ = tx.send(ControlMessage::Shutdown);
            }
            Err(err) => tracing::error!(error = %err, "waiting for signals failed"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::control_channel;
    use std::os::unix::thread::JoinHandleExt;
    use std::time::Duration;

    #[test]
    fn wait_returns_a_blocked_pending_signal() {
        let received = thread::spawn(|| {
            let set = SignalSet::from_signals(&[libc::SIGUSR2]).unwrap();
            set.block().unwrap();
            // SAFETY: the signal targets this thread, which has it blocked.
            unsafe { libc::pthread_kill(libc::pthread_self(), libc::SIGUSR2) };
            set.wait().unwrap()
        })
        .join()
        .unwrap();
        assert_eq!(received, libc::SIGUSR2);
    }

    #[test]
    fn signal_thread_sends_shutdown() {
        let (tx, rx) = control_channel();
        thread::spawn(move || {
            let set = SignalSet::from_signals(&[libc::SIGUSR1]).unwrap();
            set.block().unwrap();
            let handle = spawn_signal_thread(set, tx).unwrap();
            // SAFETY: the signal thread inherited the blocked mask and waits in sigwait.
            unsafe { libc::pthread_kill(handle.as_pthread_t(), libc::SIGUSR1) };
            handle.join().unwrap();
        })
        .join()
        .unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            ControlMessage::Shutdown
        );
    }

    #[test]
    fn names_known_signals() {
        assert_eq!(signal_name(libc::SIGTERM), "SIGTERM");
        assert_eq!(signal_name(libc::SIGUSR1), "signal");
    }
}
