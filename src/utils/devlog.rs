//! Developer log lines with a thread-local sink, so tests can assert on what a
//! query emitted without installing a global logger.

use std::cell::RefCell;

thread_local! {
    static TL_SINK: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Disables the thread-local sink on drop.
pub struct DevSinkGuard;

impl Drop for DevSinkGuard {
    fn drop(&mut self) {
        TL_SINK.with(|s| *s.borrow_mut() = None);
    }
}

/// Starts capturing on the current thread until the guard is dropped.
#[must_use]
pub fn enable_thread_sink() -> DevSinkGuard {
    TL_SINK.with(|s| *s.borrow_mut() = Some(Vec::new()));
    DevSinkGuard
}

pub fn write_str(msg: &str) {
    TL_SINK.with(|s| {
        if let Some(buf) = s.borrow_mut().as_mut() {
            buf.push(msg.to_owned());
        }
    });
}

/// Takes the captured lines; empty when the sink is off.
#[must_use]
pub fn drain() -> Vec<String> {
    TL_SINK.with(|s| s.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
}

#[must_use]
pub fn snapshot() -> Vec<String> {
    TL_SINK.with(|s| s.borrow().as_ref().cloned().unwrap_or_default())
}

/// Captures a line in the thread sink and forwards it at TRACE to the devlog target.
#[macro_export]
macro_rules! devlog {
    ($($arg:tt)*) => {{
        let __s = format!($($arg)*);
        $crate::utils::devlog::write_str(&__s);
        log::log!(target: $crate::utils::logger::DEVLOG_TARGET, log::Level::Trace, "{}", __s);
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_captures_and_drains() {
        let _g = enable_thread_sink();
        crate::devlog!("alpha {}", 1);
        crate::devlog!("beta");
        assert_eq!(snapshot(), vec!["alpha 1", "beta"]);
        assert_eq!(drain().len(), 2);
        assert!(snapshot().is_empty());
    }

    #[test]
    fn other_threads_are_not_captured() {
        let _g = enable_thread_sink();
        crate::devlog!("main-thread");
        let child = std::thread::spawn(|| {
            crate::devlog!("child-thread");
            snapshot()
        })
        .join()
        .unwrap();
        assert!(child.is_empty());
        assert_eq!(snapshot(), vec!["main-thread"]);
    }
}
