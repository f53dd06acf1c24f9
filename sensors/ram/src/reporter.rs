//! The sample → trigger → sleep loop.

use crate::memory::{MemorySampler, MemoryStatsProvider};
use sketchysensor_rs_core::{BarClient, BarCommand, SensorError};
use std::future::Future;
use std::time::Duration;
use tokio::time;

/// Drives one event: registers it, then triggers it on every sample.
#[derive(Debug)]
pub struct Reporter<P, B> {
    event: String,
    interval: Duration,
    sampler: MemorySampler<P>,
    bar: B,
    registered: bool,
}

impl<P, B> Reporter<P, B>
where
    P: MemoryStatsProvider,
    B: BarClient,
{
    /// Create a reporter. Nothing is sent until [`Reporter::register`] or
    /// [`Reporter::run`].
    pub fn new(event: impl Into<String>, interval: Duration, sampler: MemorySampler<P>, bar: B) -> Self {
        Self {
            event: event.into(),
            interval,
            sampler,
            bar,
            registered: false,
        }
    }

    /// Declare the event with the bar. Only the first call sends anything.
    ///
    /// # Errors
    ///
    /// Returns the delivery error; the reporter stays unregistered.
    pub async fn register(&mut self) -> Result<(), SensorError> {
        if self.registered {
            return Ok(());
        }
        self.bar.send(&BarCommand::add_event(&self.event)).await?;
        self.registered = true;
        tracing::info!(event = %self.event, "event registered");
        Ok(())
    }

    /// Take one sample and trigger the event.
    ///
    /// Registers first if that has not happened yet.
    ///
    /// # Errors
    ///
    /// Returns the sampling or delivery error for this iteration.
    pub async fn report_once(&mut self) -> Result<(), SensorError> {
        self.register().await?;
        let command = self.sampler.refresh()?.trigger(&self.event);
        self.bar.send(&command).await
    }

    /// Register, then sample and trigger every `interval` until `shutdown`
    /// resolves.
    ///
    /// Sampling and trigger failures are logged and the loop carries on with
    /// the next tick.
    ///
    /// # Errors
    ///
    /// Only registration failure is returned.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<(), SensorError>
    where
        F: Future<Output = ()>,
    {
        self.register().await?;
        tokio::pin!(shutdown);

        loop {
            if let Err(e) = self.report_once().await {
                tracing::warn!(event = %self.event, error = %e, "skipping update");
            }

            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!(event = %self.event, "shutting down");
                    return Ok(());
                }
                () = time::sleep(self.interval) => {}
            }
        }
    }

    /// The bar client.
    pub fn bar(&self) -> &B {
        &self.bar
    }
}

/// Parse the interval argument: positive, finite seconds, at least 1µs.
///
/// Fractional seconds are kept at microsecond granularity.
///
/// # Errors
///
/// Returns a human readable message for clap to display.
pub fn parse_interval(s: &str) -> Result<Duration, String> {
    let secs = s
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("'{}' is not a number of seconds", s))?;

    if !secs.is_finite() || secs <= 0.0 {
        return Err("Interval must be a positive number of seconds".to_owned());
    }

    let micros = (secs * 1_000_000.0) as u64;
    if micros == 0 {
        return Err("Interval must be at least one microsecond".to_owned());
    }

    Ok(Duration::from_micros(micros))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::tests::{pages_for, FakeProvider, GIB};
    use async_trait::async_trait;
    use tokio::time::Instant;

    /// Records every command with the (virtual) time it arrived.
    #[derive(Default)]
    struct RecordingBar {
        sent: Vec<(Instant, BarCommand)>,
        fail_registration: bool,
        fail_triggers: bool,
    }

    impl RecordingBar {
        fn commands(&self) -> Vec<&BarCommand> {
            self.sent.iter().map(|(_, cmd)| cmd).collect()
        }

        fn trigger_times(&self) -> Vec<Instant> {
            self.sent
                .iter()
                .filter(|(_, cmd)| matches!(cmd, BarCommand::Trigger { .. }))
                .map(|(at, _)| *at)
                .collect()
        }
    }

    #[async_trait]
    impl BarClient for RecordingBar {
        async fn send(&mut self, command: &BarCommand) -> Result<(), SensorError> {
            self.sent.push((Instant::now(), command.clone()));
            match command {
                BarCommand::AddEvent { .. } if self.fail_registration => {
                    Err(SensorError::delivery(command, "bar not running"))
                }
                BarCommand::Trigger { .. } if self.fail_triggers => {
                    Err(SensorError::delivery(command, "bar not running"))
                }
                _ => Ok(()),
            }
        }
    }

    fn reporter(
        interval: Duration,
        pages: Vec<Result<crate::memory::PageCounts, i64>>,
        bar: RecordingBar,
    ) -> Reporter<FakeProvider, RecordingBar> {
        let sampler = MemorySampler::initialize(FakeProvider::new(16 * GIB, pages)).unwrap();
        Reporter::new("ram_update", interval, sampler, bar)
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("0.5").unwrap(), Duration::from_micros(500_000));
        assert_eq!(parse_interval("2").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_interval("0.000001").unwrap(), Duration::from_micros(1));
    }

    #[test]
    fn test_parse_interval_rejects_bad_input() {
        for bad in ["abc", "", "0", "-1", "NaN", "inf", "0.0000001"] {
            assert!(parse_interval(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_registers_once_before_first_trigger() {
        let pages = vec![Ok(pages_for(8 * GIB)); 4];
        let mut reporter = reporter(Duration::from_millis(500), pages, RecordingBar::default());

        reporter.register().await.unwrap();
        reporter.run(time::sleep(Duration::from_millis(1200))).await.unwrap();

        let commands = reporter.bar().commands();
        assert_eq!(commands[0], &BarCommand::add_event("ram_update"));
        let registrations = commands
            .iter()
            .filter(|cmd| matches!(cmd, BarCommand::AddEvent { .. }))
            .count();
        assert_eq!(registrations, 1);
        assert!(commands.len() > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_payload() {
        let mut reporter = reporter(
            Duration::from_secs(1),
            vec![Ok(pages_for(8 * GIB))],
            RecordingBar::default(),
        );

        reporter.report_once().await.unwrap();

        let commands = reporter.bar().commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(
            commands[1].args(),
            vec![
                "--trigger",
                "ram_update",
                "used_percentage=50",
                "used_gb=8.00",
                "total_gb=16.00"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_second_interval_between_triggers() {
        let pages = vec![Ok(pages_for(GIB)); 8];
        let mut reporter = reporter(Duration::from_micros(500_000), pages, RecordingBar::default());

        reporter.run(time::sleep(Duration::from_millis(1600))).await.unwrap();

        let times = reporter.bar().trigger_times();
        assert_eq!(times.len(), 4);
        for pair in times.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_micros(500_000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_failure_skips_trigger_only() {
        let pages = vec![Ok(pages_for(GIB)), Err(5), Ok(pages_for(2 * GIB))];
        let mut reporter = reporter(Duration::from_secs(1), pages, RecordingBar::default());

        reporter.run(time::sleep(Duration::from_millis(2500))).await.unwrap();

        let triggers: Vec<_> = reporter
            .bar()
            .commands()
            .into_iter()
            .filter_map(|cmd| match cmd {
                BarCommand::Trigger { vars, .. } => Some(vars[1].1.clone()),
                BarCommand::AddEvent { .. } => None,
            })
            .collect();
        assert_eq!(triggers, vec!["1.00", "2.00"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_failure_keeps_looping() {
        let bar = RecordingBar {
            fail_triggers: true,
            ..RecordingBar::default()
        };
        let pages = vec![Ok(pages_for(GIB)); 3];
        let mut reporter = reporter(Duration::from_secs(1), pages, bar);

        reporter.run(time::sleep(Duration::from_millis(2500))).await.unwrap();

        assert_eq!(reporter.bar().trigger_times().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_registration_failure_is_fatal() {
        let bar = RecordingBar {
            fail_registration: true,
            ..RecordingBar::default()
        };
        let mut reporter = reporter(Duration::from_secs(1), vec![Ok(pages_for(GIB))], bar);

        let err = reporter.run(std::future::pending()).await.unwrap_err();
        assert!(matches!(err, SensorError::Delivery { .. }));
        assert_eq!(reporter.bar().commands().len(), 1);
        assert!(reporter.bar().trigger_times().is_empty());
    }
}
