//! Real-Time Thread Priority
//!
//! Promotes the calling thread into the platform's pro-audio scheduling
//! class and restores the previous priority when the guard is dropped.
//! Promotion is best-effort: callers treat failure as a warning, never a
//! startup error.
//!
//! The guard is thread-affine by contract: it must be dropped on the same
//! thread that created it. The engine's workers acquire it on first
//! callback entry and release it when they observe the engine stop (or at
//! stream teardown, which happens on the callback's own thread going away).

use crate::error::HostError;

/// Restores the previous scheduling parameters on drop.
pub struct RtPriorityGuard {
    #[cfg(unix)]
    prev_policy: libc::c_int,
    #[cfg(unix)]
    prev_param: libc::sched_param,
    #[cfg(windows)]
    prev_priority: i32,
}

/// Priority level for SCHED_RR that does not require special privileges on
/// most systems while still outranking normal timesharing threads.
#[cfg(unix)]
const RT_PRIORITY: libc::c_int = 47;

/// Raise the calling thread into the pro-audio scheduling class.
///
/// On unix this requests `SCHED_RR`; on Windows it sets
/// `THREAD_PRIORITY_TIME_CRITICAL`. On other systems this is a no-op
/// failure reported as [`HostError::RtUnavailable`].
pub fn promote_current_thread() -> Result<RtPriorityGuard, HostError> {
    #[cfg(unix)]
    {
        unsafe {
            let thread = libc::pthread_self();

            let mut prev_policy: libc::c_int = 0;
            let mut prev_param: libc::sched_param = std::mem::zeroed();
            let rc = libc::pthread_getschedparam(thread, &mut prev_policy, &mut prev_param);
            if rc != 0 {
                return Err(HostError::RtUnavailable(format!(
                    "pthread_getschedparam failed: {rc}"
                )));
            }

            let mut param: libc::sched_param = std::mem::zeroed();
            param.sched_priority = RT_PRIORITY;
            let rc = libc::pthread_setschedparam(thread, libc::SCHED_RR, &param);
            if rc != 0 {
                return Err(HostError::RtUnavailable(format!(
                    "pthread_setschedparam(SCHED_RR) failed: {rc}"
                )));
            }

            Ok(RtPriorityGuard {
                prev_policy,
                prev_param,
            })
        }
    }

    #[cfg(windows)]
    {
        use windows::Win32::System::Threading::{
            GetCurrentThread, GetThreadPriority, SetThreadPriority, THREAD_PRIORITY,
            THREAD_PRIORITY_TIME_CRITICAL,
        };

        unsafe {
            let thread = GetCurrentThread();
            let prev_priority = GetThreadPriority(thread);
            SetThreadPriority(thread, THREAD_PRIORITY_TIME_CRITICAL)
                .map_err(|e| HostError::RtUnavailable(e.to_string()))?;
            Ok(RtPriorityGuard { prev_priority })
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        Err(HostError::RtUnavailable(
            "no pro-audio scheduling class on this platform".into(),
        ))
    }
}

impl Drop for RtPriorityGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        unsafe {
            let thread = libc::pthread_self();
            let _ = libc::pthread_setschedparam(thread, self.prev_policy, &self.prev_param);
        }

        #[cfg(windows)]
        unsafe {
            use windows::Win32::System::Threading::{
                GetCurrentThread, SetThreadPriority, THREAD_PRIORITY,
            };
            let _ = SetThreadPriority(GetCurrentThread(), THREAD_PRIORITY(self.prev_priority));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Promotion needs privileges that CI rarely grants; exercise the call
    // path and accept either outcome.
    #[test]
    fn test_promote_restores_on_drop() {
        match promote_current_thread() {
            Ok(guard) => drop(guard),
            Err(HostError::RtUnavailable(_)) => {}
            Err(other) => panic!("unexpected error kind: {other}"),
        }
    }
}
