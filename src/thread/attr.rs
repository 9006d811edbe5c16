//! Thread creation attributes

use core::time::Duration;

use crate::prio::ThreadPrio;
use crate::types::{ThreadOptions, Timeout};

/// Priority, start delay and option flags of a thread to be created.
///
/// A fresh attribute set starts the thread immediately at
/// [`ThreadPrio::default`] with no options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadAttr {
    prio: ThreadPrio,
    options: ThreadOptions,
    delay: Timeout,
}

impl Default for ThreadAttr {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! option_setter {
    ($(#[$doc:meta])* $name:ident, $flag:ident) => {
        $(#[$doc])*
        #[must_use]
        pub const fn $name(self, on: bool) -> Self {
            let options = if on {
                self.options.union(ThreadOptions::$flag)
            } else {
                self.options.difference(ThreadOptions::$flag)
            };
            ThreadAttr { options, ..self }
        }
    };
}

impl ThreadAttr {
    pub const fn new() -> Self {
        ThreadAttr {
            prio: ThreadPrio::highest_preempt(),
            options: ThreadOptions::empty(),
            delay: Timeout::NoWait,
        }
    }

    #[must_use]
    pub const fn with_prio(self, prio: ThreadPrio) -> Self {
        ThreadAttr { prio, ..self }
    }

    /// Delay the start of the thread by `delay`. A zero delay starts it
    /// immediately.
    #[must_use]
    pub fn with_start_delay(self, delay: Duration) -> Self {
        ThreadAttr {
            delay: Timeout::from(delay),
            ..self
        }
    }

    /// Create the thread suspended until [`Thread::start`](super::Thread::start)
    /// is called. Turning this off again only clears a suspended start, not
    /// a start delay.
    #[must_use]
    pub const fn suspended(self, on: bool) -> Self {
        let delay = match (on, self.delay) {
            (true, _) => Timeout::Forever,
            (false, Timeout::Forever) => Timeout::NoWait,
            (false, d) => d,
        };
        ThreadAttr { delay, ..self }
    }

    option_setter!(
        /// Mark the thread essential: its abnormal end aborts the process
        essential, ESSENTIAL
    );
    option_setter!(user, USER);
    option_setter!(inherit_perms, INHERIT_PERMS);
    option_setter!(fp_regs, FP_REGS);
    option_setter!(sse_regs, SSE_REGS);

    pub const fn prio(&self) -> ThreadPrio {
        self.prio
    }

    pub const fn options(&self) -> ThreadOptions {
        self.options
    }

    /// Start delay; [`Timeout::Forever`] for a suspended start
    pub const fn delay(&self) -> Timeout {
        self.delay
    }

    pub const fn is_suspended(&self) -> bool {
        matches!(self.delay, Timeout::Forever)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suspended_toggle_keeps_start_delay() {
        let attr = ThreadAttr::new()
            .with_start_delay(Duration::from_millis(5))
            .suspended(false);
        assert_eq!(attr.delay(), Timeout::Ticks(50));

        let attr = attr.suspended(true);
        assert!(attr.is_suspended());
        assert_eq!(attr.suspended(false).delay(), Timeout::NoWait);
    }

    #[test]
    fn option_flags() {
        let attr = ThreadAttr::new().essential(true).fp_regs(true).essential(false);
        assert_eq!(attr.options(), ThreadOptions::FP_REGS);
    }
}
