use tokio::sync::mpsc::UnboundedSender;

#[macro_export]
macro_rules! ensure {
    ($cond:expr) => {
        if !($cond) {
            return None;
        }
    };
    ($cond:expr, $err:expr) => {
        if !($cond) {
            return Err($err.into());
        }
    };
}

#[macro_export]
macro_rules! log_assert {
    ($cond:expr) => {
        if !($cond) {
            tracing::warn!("Assertion failed: {}", stringify!($cond));
        }
    };
}

pub trait DispatchExt<T> {
    /// Sends a copy of `value` to every live receiver, dropping the ones
    /// that hung up. Returns whether anyone is still listening.
    fn dispatch(&mut self, value: T) -> bool;
}

impl<T: Clone> DispatchExt<T> for Vec<UnboundedSender<T>> {
    fn dispatch(&mut self, value: T) -> bool {
        self.retain(|tx| tx.send(value.clone()).is_ok());
        !self.is_empty()
    }
}
