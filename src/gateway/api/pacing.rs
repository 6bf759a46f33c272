//! Usage: Injectable sleep and jitter sources for request pacing and retry backoff.

use rand::Rng;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub const JITTER_MIN: f64 = 0.25;
pub const JITTER_MAX: f64 = 1.0;

pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> SleepFuture<'_>;
}

/// Multiplier source for exponential backoff; values lie in `[JITTER_MIN, JITTER_MAX)`.
pub trait JitterSource: Send + Sync {
    fn next_jitter(&self) -> f64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
        Box::pin(tokio::time::sleep(duration))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn next_jitter(&self) -> f64 {
        rand::thread_rng().gen_range(JITTER_MIN..JITTER_MAX)
    }
}
