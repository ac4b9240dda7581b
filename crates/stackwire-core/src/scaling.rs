//! CPU-based auto-scaling policy and its simulation

use crate::profile::{CapacityParams, MAX_SERVICE_REPLICAS};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

pub const TARGET_CPU_PERCENT: f64 = 50.0;
pub const SCALE_COOLDOWN: Duration = Duration::from_secs(60);

/// Target-tracking policy attached to the service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalingPolicy {
    pub target_cpu_percent: f64,
    pub min_capacity: u32,
    pub max_capacity: u32,
    pub scale_in_cooldown: Duration,
    pub scale_out_cooldown: Duration,
    /// How long a breach must persist before a step is taken
    pub evaluation_window: Duration,
}

impl ScalingPolicy {
    pub fn for_capacity(capacity: &CapacityParams) -> Self {
        Self {
            target_cpu_percent: TARGET_CPU_PERCENT,
            min_capacity: capacity.service_desired_count,
            max_capacity: MAX_SERVICE_REPLICAS.max(capacity.service_desired_count),
            scale_in_cooldown: SCALE_COOLDOWN,
            scale_out_cooldown: SCALE_COOLDOWN,
            evaluation_window: SCALE_COOLDOWN,
        }
    }

    /// Provider request payload
    pub fn to_config(&self) -> serde_json::Value {
        json!({
            "metric": "cpu_utilization",
            "target_percent": self.target_cpu_percent,
            "min_capacity": self.min_capacity,
            "max_capacity": self.max_capacity,
            "scale_in_cooldown_secs": self.scale_in_cooldown.as_secs(),
            "scale_out_cooldown_secs": self.scale_out_cooldown.as_secs(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingDecision {
    Hold,
    ScaleOut { from: u32, to: u32 },
    ScaleIn { from: u32, to: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trend {
    Above,
    Below,
}

/// Replays utilization samples against a [`ScalingPolicy`]
///
/// Time is the offset from the start of the simulation. Samples must be fed
/// in non-decreasing time order.
#[derive(Debug, Clone)]
pub struct Autoscaler {
    policy: ScalingPolicy,
    replicas: u32,
    breach: Option<(Trend, Duration)>,
    last_scale_out: Option<Duration>,
    last_scale_in: Option<Duration>,
}

impl Autoscaler {
    pub fn new(policy: ScalingPolicy) -> Self {
        Self {
            replicas: policy.min_capacity,
            policy,
            breach: None,
            last_scale_out: None,
            last_scale_in: None,
        }
    }

    pub fn replicas(&self) -> u32 {
        self.replicas
    }

    pub fn policy(&self) -> &ScalingPolicy {
        &self.policy
    }

    pub fn observe(&mut self, at: Duration, cpu_percent: f64) -> ScalingDecision {
        let trend = if cpu_percent > self.policy.target_cpu_percent {
            Trend::Above
        } else if cpu_percent < self.policy.target_cpu_percent {
            Trend::Below
        } else {
            self.breach = None;
            return ScalingDecision::Hold;
        };

        let since = match self.breach {
            Some((current, since)) if current == trend => since,
            _ => {
                self.breach = Some((trend, at));
                at
            }
        };
        if at.saturating_sub(since) < self.policy.evaluation_window {
            return ScalingDecision::Hold;
        }

        match trend {
            Trend::Above => self.scale_out(at),
            Trend::Below => self.scale_in(at),
        }
    }

    fn scale_out(&mut self, at: Duration) -> ScalingDecision {
        if self.replicas >= self.policy.max_capacity
            || cooling_down(self.last_scale_out, at, self.policy.scale_out_cooldown)
        {
            return ScalingDecision::Hold;
        }

        let from = self.replicas;
        self.replicas += 1;
        self.last_scale_out = Some(at);
        self.breach = Some((Trend::Above, at));
        tracing::debug!(from, to = self.replicas, "scale out");
        ScalingDecision::ScaleOut {
            from,
            to: self.replicas,
        }
    }

    fn scale_in(&mut self, at: Duration) -> ScalingDecision {
        if self.replicas <= self.policy.min_capacity
            || cooling_down(self.last_scale_in, at, self.policy.scale_in_cooldown)
        {
            return ScalingDecision::Hold;
        }

        let from = self.replicas;
        self.replicas -= 1;
        self.last_scale_in = Some(at);
        self.breach = Some((Trend::Below, at));
        tracing::debug!(from, to = self.replicas, "scale in");
        ScalingDecision::ScaleIn {
            from,
            to: self.replicas,
        }
    }
}

fn cooling_down(last: Option<Duration>, at: Duration, cooldown: Duration) -> bool {
    last.is_some_and(|last| at.saturating_sub(last) < cooldown)
}
