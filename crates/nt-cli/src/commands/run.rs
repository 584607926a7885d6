//! Interactive reading session (`nt run`).
//!
//! One loop multiplexes the 1-second ticker, the periodic source refresh,
//! finished background store work and commands typed on stdin. The refresh
//! only queues a read on the driver's worker, so a slow store never holds up
//! a tick. The ticker only exists while the driver asks for it; dropping it is
//! what stops further ticks.

use std::future;
use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use nt_core::{SourceKey, UsageStore};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use crate::commands::util::{parse_key, print_notices};
use crate::display::{render_sources, render_status};
use crate::driver::SessionDriver;

const TICK: Duration = Duration::from_secs(1);

const HELP: &str = "\
Commands:
  select <key>   switch to a source and start its timer
  start          resume the current source
  pause          stop the timer
  status         show remaining time and progress
  sources        list sources
  reset          clear today's usage
  help           show this help
  quit           pause and exit";

#[derive(Debug, PartialEq, Eq)]
enum Control {
    Continue,
    Quit,
}

/// Runs the session on stdin until `quit` or end of input.
pub async fn run<W: Write, S: UsageStore + 'static>(
    writer: &mut W,
    driver: &mut SessionDriver<S>,
    source: Option<SourceKey>,
    refresh_every: Option<Duration>,
) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    run_with_input(writer, driver, stdin, source, refresh_every).await
}

/// Runs the session reading commands from `input`.
pub async fn run_with_input<W, S, R>(
    writer: &mut W,
    driver: &mut SessionDriver<S>,
    input: R,
    source: Option<SourceKey>,
    refresh_every: Option<Duration>,
) -> Result<()>
where
    W: Write,
    S: UsageStore + 'static,
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut ticker: Option<Interval> = None;
    let mut refresh = refresh_every.map(|period| every(period, MissedTickBehavior::Skip));

    writeln!(writer, "{HELP}")?;
    if let Some(key) = source {
        driver.select(&key).await;
    }
    print_notices(writer, driver)?;

    loop {
        sync_ticker(&mut ticker, driver.is_ticking());
        tokio::select! {
            () = next_tick(&mut ticker) => driver.tick().await,
            () = next_tick(&mut refresh) => driver.begin_refresh(),
            Some(outcome) = driver.join_sync(), if driver.has_pending_sync() => {
                driver.sync_finished(outcome);
            }
            line = lines.next_line() => {
                let line = line.context("failed to read command")?;
                let control = match line {
                    Some(line) => handle_line(writer, driver, &line).await?,
                    None => Control::Quit,
                };
                if control == Control::Quit {
                    break;
                }
            }
        }
        print_notices(writer, driver)?;
    }

    driver.pause().await;
    driver.finish().await;
    print_notices(writer, driver)?;
    Ok(())
}

async fn handle_line<W: Write, S: UsageStore + 'static>(
    writer: &mut W,
    driver: &mut SessionDriver<S>,
    line: &str,
) -> Result<Control> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(Control::Continue);
    };
    match command {
        "select" | "s" => match words.next() {
            Some(key) => driver.select(&parse_key(key)?).await,
            None => writeln!(writer, "usage: select <key>")?,
        },
        "start" => driver.start().await,
        "pause" | "p" => driver.pause().await,
        "status" => render_status(writer, driver.machine(), driver.mode())?,
        "sources" => {
            let machine = driver.machine();
            render_sources(writer, machine.sources(), machine.current_source())?;
        }
        "reset" => driver.reset().await,
        "help" | "?" => writeln!(writer, "{HELP}")?,
        "quit" | "q" | "exit" => return Ok(Control::Quit),
        other => writeln!(writer, "Unknown command: {other} (type `help`)")?,
    }
    Ok(Control::Continue)
}

/// An interval whose first tick is one period from now.
fn every(period: Duration, missed: MissedTickBehavior) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(missed);
    interval
}

/// Seconds missed while the loop was busy are caught up, not dropped.
fn sync_ticker(ticker: &mut Option<Interval>, running: bool) {
    if running && ticker.is_none() {
        *ticker = Some(every(TICK, MissedTickBehavior::Burst));
    } else if !running {
        *ticker = None;
    }
}

/// Completes on the next tick, or never if there is no interval.
async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nt_client::LocalCache;
    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::testing::FakeStore;

    #[tokio::test]
    async fn ticker_follows_the_driver() {
        let mut ticker = None;
        sync_ticker(&mut ticker, true);
        assert!(ticker.is_some());
        sync_ticker(&mut ticker, false);
        assert!(ticker.is_none());
    }

    #[tokio::test]
    async fn missing_interval_never_fires() {
        let mut none: Option<Interval> = None;
        let fired = tokio::time::timeout(Duration::from_millis(50), next_tick(&mut none)).await;
        assert!(fired.is_err());

        let mut some = Some(every(Duration::from_millis(10), MissedTickBehavior::Delay));
        let fired = tokio::time::timeout(Duration::from_secs(2), next_tick(&mut some)).await;
        assert!(fired.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_refresh_does_not_hold_up_the_ticker() {
        let store = FakeStore::with_sources(&[("a", 3600)]);
        let temp = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(temp.path().join("cache.json"));
        let mut driver = SessionDriver::load(Arc::clone(&store), cache).await;
        store.set_slow_reads(true);

        let (input, mut typing) = tokio::io::duplex(64);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60_500)).await;
            typing.write_all(b"quit\n").await.unwrap();
        });

        let mut output = Vec::new();
        run_with_input(
            &mut output,
            &mut driver,
            BufReader::new(input),
            Some(SourceKey::new("a").unwrap()),
            Some(Duration::from_secs(5)),
        )
        .await
        .unwrap();

        assert_eq!(driver.machine().daily_used(), 60);
        let a = driver.machine().source(&SourceKey::new("a").unwrap()).unwrap();
        assert_eq!(a.timer.used, 60);
        assert!(!driver.is_ticking());
    }
}
