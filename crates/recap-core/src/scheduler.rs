//! Cron-driven daily digest.
//!
//! - Standard 5-field cron syntax (min hour dom mon dow), local time
//! - One job loop per scheduler, cancelled through a `CancellationToken`
//! - Every run sweeps the configured channels through the [`Recapper`]

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Datelike, Local, Timelike};
use tokio::{task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    config::DigestConfig,
    pipeline::{Recapper, SweepReport},
    selection::SelectionLimits,
    trigger::Trigger,
    Error, Result,
};

#[derive(Clone)]
pub struct DigestScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    recapper: Arc<Recapper>,
    digest: DigestConfig,
    limits: SelectionLimits,
    expr: CronExpr,
    job: tokio::sync::Mutex<Option<JobEntry>>,
}

struct JobEntry {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl DigestScheduler {
    /// Fails when the cron expression does not parse.
    pub fn new(
        recapper: Arc<Recapper>,
        digest: DigestConfig,
        limits: SelectionLimits,
    ) -> Result<Self> {
        let expr = CronExpr::parse(&digest.cron)
            .map_err(|e| Error::Config(format!("invalid DIGEST_CRON {:?}: {e}", digest.cron)))?;
        Ok(Self {
            inner: Arc::new(SchedulerInner {
                recapper,
                digest,
                limits,
                expr,
                job: tokio::sync::Mutex::new(None),
            }),
        })
    }

    /// Spawn the job loop. Restarts it if already running.
    pub async fn start(&self) {
        self.stop().await;

        let cancel = CancellationToken::new();
        let scheduler = self.clone();
        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(async move {
            scheduler.job_loop(cancel_clone).await;
        });

        *self.inner.job.lock().await = Some(JobEntry { cancel, handle });
        info!(
            cron = %self.inner.digest.cron,
            channels = self.inner.digest.channels.len(),
            destination = %self.inner.digest.destination,
            "digest scheduler started"
        );
    }

    pub async fn stop(&self) {
        if let Some(job) = self.inner.job.lock().await.take() {
            job.cancel.cancel();
            job.handle.abort(); // best-effort
        }
    }

    /// Next fire time after `now`, if the expression can ever match.
    pub fn next_run(&self, now: DateTime<Local>) -> Option<DateTime<Local>> {
        self.inner.expr.next_after(now)
    }

    /// One sweep over every configured channel.
    pub async fn run_sweep(&self) -> SweepReport {
        let trigger = Trigger::Sweep {
            channels: self.inner.digest.channels.clone(),
            destination: self.inner.digest.destination.clone(),
        };
        // Sweeps carry no keyword.
        let Some(invocation) = trigger.normalize(&self.inner.limits, "") else {
            return SweepReport::default();
        };
        self.inner
            .recapper
            .sweep(
                &invocation.targets,
                &invocation.mode,
                &self.inner.digest.destination,
            )
            .await
    }

    async fn job_loop(&self, cancel: CancellationToken) {
        loop {
            let Some(next) = self.next_run(Local::now()) else {
                warn!(cron = %self.inner.digest.cron, "digest has no next run, stopping");
                break;
            };

            let now = Local::now();
            let dur = (next - now).to_std().unwrap_or(Duration::from_secs(0));

            tokio::select! {
              _ = cancel.cancelled() => break,
              _ = sleep(dur) => {
                info!("running scheduled digest");
                self.run_sweep().await;
              }
            }
        }
    }
}

// === Cron expression engine ===

#[derive(Clone, Debug)]
struct CronExpr {
    min: Field,
    hour: Field,
    dom: Field,
    mon: Field,
    dow: Field,
}

#[derive(Clone, Debug)]
struct Field {
    min: u32,
    max: u32,
    any: bool,
    allowed: Vec<bool>, // index = value
}

impl CronExpr {
    fn parse(expr: &str) -> Result<Self> {
        let parts = expr.split_whitespace().collect::<Vec<_>>();
        if parts.len() != 5 {
            return Err(Error::Config(format!(
                "expected 5 fields, got {}",
                parts.len()
            )));
        }

        Ok(Self {
            min: Field::parse(parts[0], 0, 59, false)?,
            hour: Field::parse(parts[1], 0, 23, false)?,
            dom: Field::parse(parts[2], 1, 31, false)?,
            mon: Field::parse(parts[3], 1, 12, false)?,
            dow: Field::parse(parts[4], 0, 6, true)?,
        })
    }

    fn matches(&self, dt: DateTime<Local>) -> bool {
        if !self.min.contains(dt.minute())
            || !self.hour.contains(dt.hour())
            || !self.mon.contains(dt.month())
        {
            return false;
        }

        // If both DOM and DOW are restricted, match when EITHER matches.
        let dom_match = self.dom.contains(dt.day());
        let dow_match = self.dow.contains(dt.weekday().num_days_from_sunday());

        match (self.dom.any, self.dow.any) {
            (true, true) => true,
            (true, false) => dow_match,
            (false, true) => dom_match,
            (false, false) => dom_match || dow_match,
        }
    }

    fn next_after(&self, now: DateTime<Local>) -> Option<DateTime<Local>> {
        // Start at the next minute boundary.
        let mut t = now + chrono::Duration::minutes(1);
        t = t.with_second(0)?.with_nanosecond(0)?;

        // Covers a leap year; impossible expressions give up.
        let max_iters = 366usize * 24 * 60;
        for _ in 0..max_iters {
            if self.matches(t) {
                return Some(t);
            }
            t += chrono::Duration::minutes(1);
        }
        None
    }
}

impl Field {
    fn parse(raw: &str, min: u32, max: u32, allow_7_as_0: bool) -> Result<Self> {
        let raw = raw.trim();
        let mut allowed = vec![false; (max + 1) as usize];

        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (base, step) = match part.split_once('/') {
                Some((a, b)) => {
                    let step: u32 = b
                        .trim()
                        .parse()
                        .map_err(|_| Error::Config(format!("invalid step: {b}")))?;
                    if step == 0 {
                        return Err(Error::Config("step must be > 0".to_string()));
                    }
                    (a.trim(), step)
                }
                None => (part, 1),
            };

            let (start, end) = if base == "*" {
                (min, max)
            } else if let Some((a, b)) = base.split_once('-') {
                (
                    parse_u32(a.trim(), allow_7_as_0)?,
                    parse_u32(b.trim(), allow_7_as_0)?,
                )
            } else {
                let a = parse_u32(base, allow_7_as_0)?;
                if part.contains('/') {
                    (a, max)
                } else {
                    (a, a)
                }
            };

            if start < min || end > max || start > end {
                return Err(Error::Config(format!("out of range: {part}")));
            }

            let mut v = start;
            while v <= end {
                allowed[v as usize] = true;
                v += step;
            }
        }

        if !allowed.iter().any(|a| *a) {
            return Err(Error::Config(format!("empty field: {raw:?}")));
        }

        let any = (min..=max).all(|v| allowed[v as usize]);
        Ok(Self {
            min,
            max,
            any,
            allowed,
        })
    }

    fn contains(&self, v: u32) -> bool {
        if v < self.min || v > self.max {
            return false;
        }
        self.allowed.get(v as usize).copied().unwrap_or(false)
    }
}

fn parse_u32(s: &str, allow_7_as_0: bool) -> Result<u32> {
    let v: u32 = s
        .parse()
        .map_err(|_| Error::Config(format!("invalid number: {s}")))?;
    if allow_7_as_0 && v == 7 {
        return Ok(0);
    }
    Ok(v)
}
