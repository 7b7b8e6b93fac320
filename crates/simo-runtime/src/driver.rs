//! The async loop that owns a [`Pipeline`].
//!
//! One task selects over ctrl-c, the utterance being understood, new input
//! lines, the sensor poll interval and the timer tick. The select is biased in
//! that order, so a typed STOP is handled before any timer that is due in the
//! same turn.
//!
//! Understanding an utterance may wait on the language model. That wait is
//! its own select arm, so sensors keep being polled and new lines keep being
//! read while it is in flight. A newer line supersedes the one in flight, and
//! a safety stop drops it.

use simo_config::SimoConfig;
use simo_core::Result;
use simo_safety::SafetyUpdate;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::pipeline::{Pipeline, PipelineOutcome, TickEvent};

type InFlight<'a> = Pin<Box<dyn Future<Output = PipelineOutcome> + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverOptions {
    /// How often timers are polled.
    pub tick: Duration,
    /// How often the channel's sensor cache is fed to the arbiter.
    pub poll: Duration,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(50),
            poll: Duration::from_millis(500),
        }
    }
}

impl DriverOptions {
    pub fn from_config(config: &SimoConfig) -> Self {
        Self {
            poll: Duration::from_millis(config.safety.effective_poll_interval_ms()),
            ..Default::default()
        }
    }
}

async fn say<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}

async fn settle(in_flight: &mut Option<InFlight<'_>>) -> PipelineOutcome {
    match in_flight {
        Some(understanding) => understanding.await,
        None => std::future::pending().await,
    }
}

fn tick_message(event: &TickEvent) -> Option<String> {
    match event {
        TickEvent::Offered { prompt, .. } => Some(prompt.clone()),
        TickEvent::NextStep(outcome) => Some(outcome.reply()),
        TickEvent::ConfirmationExpired { .. } => Some("确认超时，已取消".to_string()),
        TickEvent::MotionFinished { .. } | TickEvent::SuggestionExpired { .. } => None,
    }
}

/// Read utterances line by line until EOF, `quit`, or ctrl-c, then stop the
/// robot. `status` prints the snapshot as JSON. At EOF the utterance still in
/// flight is answered before the loop ends.
pub async fn run<R, W>(
    pipeline: &Pipeline,
    input: R,
    mut output: W,
    options: DriverOptions,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut tick = tokio::time::interval(options.tick);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut poll = tokio::time::interval(options.poll);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!(
        tick_ms = options.tick.as_millis() as u64,
        poll_ms = options.poll.as_millis() as u64,
        "driver started"
    );

    let mut in_flight: Option<InFlight<'_>> = None;
    let mut input_open = true;

    loop {
        if !input_open && in_flight.is_none() {
            debug!("input closed");
            break;
        }

        tokio::select! {
            biased;

            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }

            outcome = settle(&mut in_flight), if in_flight.is_some() => {
                in_flight = None;
                say(&mut output, &outcome.reply()).await?;
            }

            line = lines.next_line(), if input_open => {
                let Some(line) = line? else {
                    input_open = false;
                    continue;
                };
                match line.trim() {
                    "" => {}
                    "quit" | "exit" => break,
                    "status" => {
                        let json = serde_json::to_string_pretty(&pipeline.snapshot())?;
                        say(&mut output, &json).await?;
                    }
                    text => {
                        if in_flight.is_some() {
                            debug!("previous utterance superseded");
                        }
                        let text = text.to_string();
                        in_flight = Some(Box::pin(async move {
                            pipeline.handle_text(&text).await
                        }));
                    }
                }
            }

            _ = poll.tick() => {
                if let SafetyUpdate::Triggered { .. } = pipeline.poll_sensors() {
                    if in_flight.take().is_some() {
                        debug!("utterance dropped by safety stop");
                    }
                }
            }

            _ = tick.tick() => {
                for event in pipeline.tick() {
                    if let Some(message) = tick_message(&event) {
                        say(&mut output, &message).await?;
                    }
                }
            }
        }
    }

    pipeline.shutdown();
    info!("driver stopped");
    Ok(())
}
