use std::io::Write as _;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::info;

use crate::concurrency::shutdown::ShutdownRx;
use crate::config::StreamingConfig;
use crate::state::StreamingState;

/// Cursor-up plus erase-line; repeated twice it rewrites the two-line
/// progress display in place.
const CLEAR_LINE: &str = "\x1b[1A\x1b[2K";

/// Rolling throughput window behind the cutover recommendation.
///
/// Keeps a five-slot ring of per-minute record deltas. The recommendation
/// fires once recent throughput has decayed to at most 5% of the first five
/// minutes' baseline, or the last minute saw no records at all.
#[derive(Debug, Default)]
pub struct CutoverTracker {
    timer: u64,
    first_five_min: i64,
    last_five_min: i64,
    till_last_min: i64,
    window: [i64; 5],
}

/// One advisor evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutoverDecision {
    /// Whether now is a safe moment to stop source writes.
    pub optimum: bool,
    /// Running record total as of this evaluation.
    pub total: i64,
}

impl CutoverTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the current processed total and returns the rolling decision.
    ///
    /// Called once per advisor interval; the delta against the previous call
    /// replaces the oldest slot of the ring.
    pub fn observe(&mut self, records_processed: i64) -> CutoverDecision {
        let slot = (self.timer % 5) as usize;

        self.last_five_min -= self.window[slot];

        self.window[slot] = records_processed - self.till_last_min;
        self.till_last_min += self.window[slot];

        self.last_five_min += self.window[slot];

        if self.timer < 5 {
            self.first_five_min += self.window[slot];
        }

        let last_min = self.window[slot];
        self.timer += 1;

        CutoverDecision {
            optimum: self.last_five_min * 100 <= 5 * self.first_five_min || last_min == 0,
            total: self.till_last_min,
        }
    }
}

/// Handle for the cutover advisor task.
#[derive(Debug)]
pub struct CutoverWorkerHandle {
    handle: Option<JoinHandle<()>>,
}

impl CutoverWorkerHandle {
    /// Waits for the advisor to observe shutdown and exit.
    pub async fn wait(mut self) {
        if let Some(handle) = self.handle.take() {
            // The advisor has no failure modes beyond a panic, which join
            // surfaces here.
            let _ = handle.await;
        }
    }
}

/// Long-lived advisor task evaluating the cutover condition every interval.
///
/// Purely advisory: it renders its recommendation on stdout and never
/// influences the pipeline. The operator decides when to stop source writes.
pub struct CutoverWorker {
    config: Arc<StreamingConfig>,
    state: Arc<StreamingState>,
    shutdown_rx: ShutdownRx,
}

impl CutoverWorker {
    pub fn new(
        config: Arc<StreamingConfig>,
        state: Arc<StreamingState>,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self {
            config,
            state,
            shutdown_rx,
        }
    }

    /// Spawns the advisor and returns a handle for monitoring.
    pub fn start(self) -> CutoverWorkerHandle {
        info!("starting cutover advisor");

        let handle = tokio::spawn(self.run());

        CutoverWorkerHandle {
            handle: Some(handle),
        }
    }

    async fn run(self) {
        render_progress(false, true, self.state.records_processed());

        let mut tracker = CutoverTracker::new();
        loop {
            sleep(self.config.cutover_interval()).await;
            if self.shutdown_rx.is_shutdown() {
                break;
            }

            let decision = tracker.observe(self.state.records_processed());
            render_progress(decision.optimum, false, decision.total);
        }

        info!("cutover advisor stopped");
    }
}

/// Renders the two-line progress display.
///
/// The first render prints plainly; subsequent renders rewrite both lines in
/// place with a cursor-up/erase sequence.
fn render_progress(optimum: bool, first_call: bool, total_records_processed: i64) {
    let mut stdout = std::io::stdout();
    let mut output = String::new();

    if !first_call {
        output.push_str(&CLEAR_LINE.repeat(2));
    }
    output.push_str(&format!(
        "Optimum time for switching to Cloud Spanner: {optimum}\n"
    ));
    output.push_str(&format!(
        "Count of records processed: {total_records_processed}\n"
    ));

    // Stdout rendering is best effort; a closed pipe must not kill the run.
    let _ = stdout.write_all(output.as_bytes());
    let _ = stdout.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(tracker: &mut CutoverTracker, deltas: &[i64]) -> Vec<CutoverDecision> {
        let mut total = 0;
        deltas
            .iter()
            .map(|delta| {
                total += delta;
                tracker.observe(total)
            })
            .collect()
    }

    #[test]
    fn throughput_decay_flips_the_recommendation() {
        let mut tracker = CutoverTracker::new();
        let decisions = feed(
            &mut tracker,
            &[1000, 1000, 1000, 1000, 1000, 0, 0, 0, 0, 0],
        );

        // Minute 5: full throughput, not an optimum moment.
        assert_eq!(
            decisions[4],
            CutoverDecision {
                optimum: false,
                total: 5000,
            }
        );
        // Minute 10: the last five minutes sum to 0 <= 5% of 5000.
        assert_eq!(
            decisions[9],
            CutoverDecision {
                optimum: true,
                total: 5000,
            }
        );
    }

    #[test]
    fn quiet_minute_alone_recommends_cutover() {
        let mut tracker = CutoverTracker::new();
        let decisions = feed(&mut tracker, &[1000, 1000, 0]);

        assert!(!decisions[0].optimum);
        assert!(!decisions[1].optimum);
        assert!(decisions[2].optimum, "a zero-delta minute is an optimum moment");
    }

    #[test]
    fn gradual_decay_below_five_percent_recommends_cutover() {
        let mut tracker = CutoverTracker::new();
        // Baseline 10000 over the first five minutes, then a trickle.
        let decisions = feed(
            &mut tracker,
            &[2000, 2000, 2000, 2000, 2000, 100, 100, 100, 100, 100],
        );

        // Minute 10: last five minutes sum to 500 == 5% of 10000.
        assert!(decisions[9].optimum);
        assert_eq!(decisions[9].total, 10_500);
    }

    #[test]
    fn steady_throughput_never_recommends_cutover() {
        let mut tracker = CutoverTracker::new();
        let decisions = feed(&mut tracker, &[500; 20]);

        assert!(decisions.iter().all(|decision| !decision.optimum));
        assert_eq!(decisions[19].total, 10_000);
    }
}
