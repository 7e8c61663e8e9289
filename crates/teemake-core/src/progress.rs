use std::io::{self, Write};
use std::time::{Duration, Instant};

use crossterm::cursor::{Hide, MoveToColumn, Show};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::{execute, queue};
use tokio::time::MissedTickBehavior;

use crate::execution::{ExecutionResult, ProcessExitStatus, RunningProcess};
use crate::models::CoreError;

pub const TICK_INTERVAL: Duration = Duration::from_millis(80);
pub const TRACK_WIDTH: usize = 24;
pub const SEGMENT_WIDTH: usize = 6;
pub const INDENT_MARKER: &str = "  │ ";

const SUCCESS_TAG: &str = "[  OK  ]";
const FAILURE_TAG: &str = "[ FAIL ]";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Success => SUCCESS_TAG,
            Self::Failure => FAILURE_TAG,
        }
    }
}

/// Operator-facing feedback for the task that is currently running.
///
/// Quiet runs get a single animated line driven by [`ProgressReporter::track`];
/// verbose runs echo output through [`ProgressReporter::echo`]. Either way a
/// task ends with one call to [`ProgressReporter::finish`].
pub struct ProgressReporter<W: Write> {
    out: W,
    tick: Duration,
    max_width: Option<usize>,
}

impl<W: Write> ProgressReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            tick: TICK_INTERVAL,
            max_width: None,
        }
    }

    pub fn tick_interval(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Fixed frame width in columns; the terminal width is used when unset.
    pub fn max_width(mut self, columns: usize) -> Self {
        self.max_width = Some(columns);
        self
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    /// Animates until `process` exits and returns its status.
    ///
    /// A process that has already exited produces no frame at all.
    pub async fn track(
        &mut self,
        process: &mut dyn RunningProcess,
        description: &str,
    ) -> ExecutionResult<ProcessExitStatus> {
        if let Some(status) = process.try_wait()? {
            return Ok(status);
        }

        let started = Instant::now();
        let columns = self.max_width.or_else(terminal_columns);
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut cursor = HiddenCursor::acquire(&mut self.out).map_err(terminal_error)?;
        let mut frame: u64 = 0;

        loop {
            ticker.tick().await;

            if let Some(status) = process.try_wait()? {
                return Ok(status);
            }

            let mut line = render_frame(frame, started.elapsed(), description);
            if let Some(columns) = columns {
                line = clip_to_width(&line, columns);
            }
            let out = cursor.writer();
            queue!(
                out,
                MoveToColumn(0),
                Clear(ClearType::CurrentLine),
                Print(line)
            )
            .and_then(|()| out.flush())
            .map_err(terminal_error)?;

            frame = frame.wrapping_add(1);
        }
    }

    pub fn echo(&mut self, line: &str) -> ExecutionResult<()> {
        writeln!(self.out, "{INDENT_MARKER}{line}")
            .and_then(|()| self.out.flush())
            .map_err(terminal_error)
    }

    pub fn diagnostics(&mut self, lines: &[String]) -> ExecutionResult<()> {
        for line in lines {
            self.echo(line)?;
        }
        Ok(())
    }

    /// Replaces whatever is on the current line with the final status line.
    pub fn finish(&mut self, outcome: Outcome, description: &str) -> ExecutionResult<()> {
        queue!(
            self.out,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(format!("{} {description}\n", outcome.tag()))
        )
        .and_then(|()| self.out.flush())
        .map_err(terminal_error)
    }
}

/// Keeps the text cursor hidden while alive; dropping it shows the cursor
/// again, on unwind and cancellation too.
struct HiddenCursor<'a, W: Write> {
    out: &'a mut W,
}

impl<'a, W: Write> HiddenCursor<'a, W> {
    fn acquire(out: &'a mut W) -> io::Result<Self> {
        execute!(out, Hide)?;
        Ok(Self { out })
    }

    fn writer(&mut self) -> &mut W {
        self.out
    }
}

impl<W: Write> Drop for HiddenCursor<'_, W> {
    fn drop(&mut self) {
        let _ = execute!(self.out, Show);
    }
}

/// Highlight segment position for `frame`, bouncing between both ends of the
/// track.
pub fn segment_offset(frame: u64, track_width: usize, segment_width: usize) -> usize {
    let travel = track_width.saturating_sub(segment_width);
    if travel == 0 {
        return 0;
    }

    let period = (travel * 2) as u64;
    let step = (frame % period) as usize;
    if step <= travel { step } else { travel * 2 - step }
}

pub fn render_track(frame: u64) -> String {
    let offset = segment_offset(frame, TRACK_WIDTH, SEGMENT_WIDTH);
    (0..TRACK_WIDTH)
        .map(|cell| {
            if (offset..offset + SEGMENT_WIDTH).contains(&cell) {
                '='
            } else {
                ' '
            }
        })
        .collect()
}

pub fn render_frame(frame: u64, elapsed: Duration, description: &str) -> String {
    format!(
        "[{}] {:>4}s  {description}",
        render_track(frame),
        elapsed.as_secs()
    )
}

/// Keeps a frame on one terminal row. The last column stays empty so the
/// cursor never reaches the pending-wrap position.
pub fn clip_to_width(line: &str, columns: usize) -> String {
    line.chars().take(columns.saturating_sub(1)).collect()
}

fn terminal_columns() -> Option<usize> {
    terminal::size()
        .ok()
        .map(|(columns, _)| usize::from(columns))
        .filter(|columns| *columns > 0)
}

fn terminal_error(error: io::Error) -> CoreError {
    CoreError::io("failed to write progress output", error)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{
        Outcome, ProgressReporter, SEGMENT_WIDTH, TRACK_WIDTH, clip_to_width, render_frame,
        render_track, segment_offset,
    };
    use crate::execution::{ExecutionResult, ProcessExitStatus, ProcessWaitFuture, RunningProcess};

    /// Reports "still running" for a fixed number of polls.
    struct CountdownProcess {
        polls_left: u32,
    }

    impl RunningProcess for CountdownProcess {
        fn pid(&self) -> Option<u32> {
            None
        }

        fn try_wait(&mut self) -> ExecutionResult<Option<ProcessExitStatus>> {
            if self.polls_left == 0 {
                return Ok(Some(ProcessExitStatus::ExitCode(0)));
            }
            self.polls_left -= 1;
            Ok(None)
        }

        fn wait(self: Box<Self>) -> ProcessWaitFuture {
            Box::pin(async { Ok(ProcessExitStatus::ExitCode(0)) })
        }
    }

    #[test]
    fn segment_sweeps_back_and_forth() {
        let travel = TRACK_WIDTH - SEGMENT_WIDTH;
        let offsets: Vec<usize> = (0..(travel as u64 * 2 + 2))
            .map(|frame| segment_offset(frame, TRACK_WIDTH, SEGMENT_WIDTH))
            .collect();

        assert_eq!(offsets[0], 0);
        assert_eq!(offsets[travel], travel);
        assert_eq!(offsets[travel + 1], travel - 1);
        assert_eq!(offsets[travel * 2], 0);
        assert_eq!(offsets[travel * 2 + 1], 1);
        assert!(offsets.iter().all(|offset| *offset <= travel));
    }

    #[test]
    fn segment_fits_a_degenerate_track() {
        assert_eq!(segment_offset(7, 4, 6), 0);
    }

    #[test]
    fn track_has_fixed_width_and_one_segment() {
        for frame in 0..50 {
            let track = render_track(frame);
            assert_eq!(track.chars().count(), TRACK_WIDTH);
            assert_eq!(track.matches('=').count(), SEGMENT_WIDTH);
            assert!(track.contains(&"=".repeat(SEGMENT_WIDTH)));
        }
    }

    #[test]
    fn frame_shows_elapsed_seconds_and_description() {
        let frame = render_frame(0, Duration::from_millis(12_400), "Compiling binary");
        assert!(frame.starts_with('['));
        assert!(frame.contains("  12s"));
        assert!(frame.ends_with("Compiling binary"));
    }

    #[test]
    fn long_descriptions_are_clipped_to_the_terminal() {
        let description = "Installing dependencies for Teeworlds with Ninja";
        let frame = render_frame(0, Duration::from_secs(3), description);
        assert!(frame.chars().count() > 80);

        let clipped = clip_to_width(&frame, 80);
        assert_eq!(clipped.chars().count(), 79);
        assert!(frame.starts_with(&clipped));

        let short = render_frame(0, Duration::from_secs(3), "Compiling binary");
        assert_eq!(clip_to_width(&short, 80), short);
        assert_eq!(clip_to_width(&short, 0), "");
    }

    #[tokio::test]
    async fn tracked_frames_respect_the_width_limit() {
        let description = "x".repeat(100);
        let mut reporter = ProgressReporter::new(Vec::new())
            .tick_interval(Duration::from_millis(1))
            .max_width(40);
        let mut process = CountdownProcess { polls_left: 4 };

        let status = reporter
            .track(&mut process, &description)
            .await
            .expect("track");

        assert_eq!(status, ProcessExitStatus::ExitCode(0));
        let text = String::from_utf8_lossy(reporter.writer()).to_string();
        assert!(text.contains("xxxxx"));
        assert!(!text.contains("xxxxxx"));
    }

    #[test]
    fn finish_writes_one_tagged_line() {
        let mut reporter = ProgressReporter::new(Vec::new());
        reporter
            .finish(Outcome::Failure, "Downloading DDNet")
            .expect("write");
        reporter.echo("fatal: repository not found").expect("write");

        let text = String::from_utf8_lossy(reporter.writer()).to_string();
        assert_eq!(text.matches("[ FAIL ] Downloading DDNet\n").count(), 1);
        assert!(text.ends_with("  │ fatal: repository not found\n"));
        assert!(!text.contains("[  OK  ]"));
    }
}
