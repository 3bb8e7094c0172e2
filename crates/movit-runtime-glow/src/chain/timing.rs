//! Per-phase GPU timing through `TIME_ELAPSED` queries.
//!
//! Queries are polled without blocking after every render; results that are
//! not ready yet are picked up by a later render.

use std::collections::VecDeque;

use glow::HasContext;
use movit_core::EngineError;

use super::EffectChain;
use crate::init::capabilities;

#[derive(Debug, Default)]
pub(crate) struct PhaseTimer {
    pending: VecDeque<glow::NativeQuery>,
    time_elapsed_ns: u64,
    num_measured_iterations: u64,
}

impl PhaseTimer {
    pub(crate) unsafe fn begin(&mut self, gl: &glow::Context) -> Result<(), EngineError> {
        let query = gl
            .create_query()
            .map_err(|e| EngineError::GlCreate(format!("create_query failed: {e:?}")))?;
        gl.begin_query(glow::TIME_ELAPSED, query);
        self.pending.push_back(query);
        Ok(())
    }

    pub(crate) unsafe fn end(&mut self, gl: &glow::Context) {
        gl.end_query(glow::TIME_ELAPSED);
    }

    /// Collect every finished query, oldest first, stopping at the first
    /// one that is still in flight.
    pub(crate) unsafe fn poll(&mut self, gl: &glow::Context) {
        while let Some(&query) = self.pending.front() {
            if gl.get_query_parameter_u32(query, glow::QUERY_RESULT_AVAILABLE) == 0 {
                break;
            }
            let ns = gl.get_query_parameter_u32(query, glow::QUERY_RESULT);
            self.time_elapsed_ns += u64::from(ns);
            self.num_measured_iterations += 1;
            gl.delete_query(query);
            self.pending.pop_front();
        }
    }

    pub(crate) fn reset(&mut self) {
        self.time_elapsed_ns = 0;
        self.num_measured_iterations = 0;
    }

    pub(crate) unsafe fn destroy(&mut self, gl: &glow::Context) {
        for query in self.pending.drain(..) {
            gl.delete_query(query);
        }
    }

    fn average_ms(&self) -> Option<f64> {
        (self.num_measured_iterations > 0).then(|| {
            self.time_elapsed_ns as f64 * 1e-6 / self.num_measured_iterations as f64
        })
    }
}

/// Average GPU time of one phase over the measured renders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseTimingReport {
    pub phase: usize,
    pub average_ms: f64,
    pub iterations: u64,
}

impl EffectChain {
    /// Time every phase of subsequent renders. Needs timer query support;
    /// without it the request is logged and ignored.
    pub fn enable_phase_timing(&mut self, enable: bool) {
        if enable && !capabilities().timer_queries {
            tracing::warn!("phase timing requested but timer queries are unsupported");
        }
        self.phase_timing = enable;
    }

    pub fn reset_phase_timing(&mut self) {
        for phase in &mut self.phases {
            phase.timer.reset();
        }
    }

    pub(crate) fn timing_active(&self) -> bool {
        self.phase_timing && capabilities().timer_queries
    }

    /// Phases that have at least one finished measurement.
    pub fn phase_timing(&self) -> Vec<PhaseTimingReport> {
        self.phases
            .iter()
            .enumerate()
            .filter_map(|(phase, p)| {
                p.timer.average_ms().map(|average_ms| PhaseTimingReport {
                    phase,
                    average_ms,
                    iterations: p.timer.num_measured_iterations,
                })
            })
            .collect()
    }

    /// Log the per-phase averages and their total at info level.
    pub fn print_phase_timing(&self) {
        let mut total_ms = 0.0;
        for report in self.phase_timing() {
            let phase = &self.phases[report.phase];
            let effects: Vec<&str> = phase
                .effects
                .iter()
                .map(|&n| self.graph.get(n).effect().effect_type_id())
                .collect();
            tracing::info!(
                phase = report.phase,
                ms = report.average_ms,
                iterations = report.iterations,
                ?effects,
                "phase timing"
            );
            total_ms += report.average_ms;
        }
        tracing::info!(ms = total_ms, "total phase time");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_needs_a_measurement() {
        let mut t = PhaseTimer::default();
        assert_eq!(t.average_ms(), None);
        t.time_elapsed_ns = 3_000_000;
        t.num_measured_iterations = 2;
        assert_eq!(t.average_ms(), Some(1.5));
        t.reset();
        assert_eq!(t.average_ms(), None);
    }
}
