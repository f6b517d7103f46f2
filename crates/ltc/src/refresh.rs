//! In-place redraw of live terminal views.
//!
//! A view renders a frame as a list of lines. After each tick the cursor
//! is moved back over the previous frame, every line is rewritten with a
//! clear-to-end-of-line, and anything left below is cleared.

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::exit_handler::ExitHandler;
use crate::terminal::{Ui, cursor};

/// Source of refresh ticks.
pub trait Clock: Send + Sync {
    /// Completes once `period` has elapsed.
    fn sleep(&self, period: Duration) -> impl Future<Output = ()> + Send;

    /// Current instant on the tokio timer, which tests may pause.
    fn now(&self) -> tokio::time::Instant {
        tokio::time::Instant::now()
    }
}

/// [`Clock`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    async fn sleep(&self, period: Duration) {
        tokio::time::sleep(period).await;
    }
}

/// Redraws a view every `rate` until `close` is cancelled.
///
/// The cursor is hidden while the view is live. It is shown again when
/// the loop ends, and an exit callback restores it if the process is
/// interrupted first.
pub async fn refresh<C, F, Fut>(
    ui: &mut dyn Ui,
    clock: &C,
    exit_handler: &ExitHandler,
    rate: Duration,
    close: &CancellationToken,
    mut render: F,
) where
    C: Clock,
    F: FnMut() -> Fut,
    Fut: Future<Output = Vec<String>>,
{
    ui.say(cursor::hide());
    exit_handler.on_exit(|| {
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(cursor::show().as_bytes());
        let _ = stdout.flush();
    });

    let mut drawn = draw(ui, &render().await, 0);
    loop {
        tokio::select! {
            biased;
            () = close.cancelled() => break,
            () = clock.sleep(rate) => {
                trace!(lines = drawn, "refreshing view");
                let frame = render().await;
                if close.is_cancelled() {
                    break;
                }
                drawn = draw(ui, &frame, drawn);
            }
        }
    }

    ui.say(cursor::show());
}

/// Writes `frame` over the `previous` lines and returns its line count.
fn draw(ui: &mut dyn Ui, frame: &[String], previous: usize) -> usize {
    if previous > 0 {
        ui.say(&cursor::up(previous));
    }
    for line in frame {
        ui.say_line(&format!("{line}{}", cursor::clear_to_end_of_line()));
    }
    ui.say(cursor::clear_to_end_of_display());
    frame.len()
}

#[cfg(test)]
pub(crate) mod fake {
    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio_util::sync::CancellationToken;

    use super::Clock;

    /// Fires a fixed number of ticks at once, then closes the view.
    #[derive(Debug)]
    pub struct FakeClock {
        ticks: Mutex<usize>,
        periods: Mutex<Vec<Duration>>,
        close: CancellationToken,
    }

    impl FakeClock {
        pub fn new(ticks: usize, close: CancellationToken) -> Self {
            Self {
                ticks: Mutex::new(ticks),
                periods: Mutex::new(Vec::new()),
                close,
            }
        }

        pub fn periods(&self) -> Vec<Duration> {
            self.periods.lock().clone()
        }
    }

    impl Clock for FakeClock {
        async fn sleep(&self, period: Duration) {
            self.periods.lock().push(period);
            let fire = {
                let mut ticks = self.ticks.lock();
                if *ticks > 0 {
                    *ticks -= 1;
                    true
                } else {
                    false
                }
            };
            if !fire {
                self.close.cancel();
                std::future::pending::<()>().await;
            }
        }
    }
}
