#![allow(dead_code)]

use std::time::{Duration, Instant};

use crate::cfn::solver::{ReparametrizationMode, SolverOptions};

/// Snapshot passed into the visitor at the end of every iteration.
#[derive(Debug, Clone, Copy)]
pub struct VisitorIn {
    pub lower_bound: f64,
    pub primal_bound: Option<f64>,
    pub iteration: usize,
}

/// Control returned by the visitor, consulted by the scheduler before starting
/// the next iteration.
#[derive(Debug, Clone, Copy)]
pub struct VisitorOut {
    pub compute_lower_bound: bool,
    pub compute_primal: bool,
    pub tighten: bool,
    pub end: bool,
    /// Set when `end` is true specifically because the time budget elapsed, as
    /// opposed to hitting `max_iterations` or stalling on dual improvement.
    pub timed_out: bool,
    pub repam_mode: ReparametrizationMode,
}

/// Drives termination and per-iteration scheduling decisions from `SolverOptions`,
/// mirroring the external CLI's termination gates (max iterations, timeout,
/// minimum dual improvement over a window) and the primal/lower-bound/tightening
/// intervals. The scheduler owns one instance per run and calls `next` once per
/// completed iteration.
pub struct Visitor {
    time_start: Instant,
    max_iterations: usize,
    time_max: Duration,
    min_dual_improvement: f64,
    min_dual_improvement_interval: usize,
    lower_bound_computation_interval: usize,
    compute_solution_period: usize,
    tighten_enabled: bool,
    tighten_iteration: usize,
    tighten_interval: usize,
    rounding_reparametrization: ReparametrizationMode,
    lower_bound_history: Vec<f64>,
}

impl Visitor {
    pub fn new(options: &SolverOptions) -> Self {
        Visitor {
            time_start: Instant::now(),
            max_iterations: options.max_iterations(),
            time_max: options.time_max(),
            min_dual_improvement: options.min_dual_improvement(),
            min_dual_improvement_interval: options.min_dual_improvement_interval(),
            lower_bound_computation_interval: options.lower_bound_computation_interval(),
            compute_solution_period: options.compute_solution_period(),
            tighten_enabled: options.tighten(),
            tighten_iteration: options.tighten_iteration(),
            tighten_interval: options.tighten_interval(),
            rounding_reparametrization: options.rounding_reparametrization(),
            lower_bound_history: Vec::new(),
        }
    }

    /// Whether the lower bound should be recomputed this iteration, or the
    /// previously-reported value reused.
    pub fn should_compute_lower_bound(&self, iteration: usize) -> bool {
        iteration % self.lower_bound_computation_interval.max(1) == 0
    }

    /// Whether the rounding sub-pass should run this iteration.
    pub fn should_compute_primal(&self, iteration: usize) -> bool {
        self.compute_solution_period > 0 && iteration % self.compute_solution_period == 0
    }

    fn should_tighten(&self, iteration: usize) -> bool {
        self.tighten_enabled
            && iteration >= self.tighten_iteration
            && (iteration - self.tighten_iteration) % self.tighten_interval.max(1) == 0
    }

    /// Consults the accumulated lower-bound history and decides whether to stop,
    /// tighten, or continue. Call once per completed iteration with the iteration's
    /// reported lower bound and primal bound (if computed this iteration).
    pub fn next(&mut self, input: VisitorIn) -> VisitorOut {
        self.lower_bound_history.push(input.lower_bound);

        let elapsed = self.time_start.elapsed();
        let mut end = false;
        let mut timed_out = false;

        if input.iteration + 1 >= self.max_iterations {
            end = true;
        } else if elapsed >= self.time_max {
            end = true;
            timed_out = true;
        } else if self.lower_bound_history.len() > self.min_dual_improvement_interval {
            let window_start = self.lower_bound_history.len() - 1 - self.min_dual_improvement_interval;
            let gain = input.lower_bound - self.lower_bound_history[window_start];
            if gain < self.min_dual_improvement {
                end = true;
            }
        }

        VisitorOut {
            compute_lower_bound: self.should_compute_lower_bound(input.iteration + 1),
            compute_primal: self.should_compute_primal(input.iteration + 1),
            tighten: !end && self.should_tighten(input.iteration),
            end,
            timed_out,
            repam_mode: self.rounding_reparametrization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_max_iterations() {
        let mut options = SolverOptions::default();
        options.set_max_iterations(3);
        let mut visitor = Visitor::new(&options);

        let mut out = visitor.next(VisitorIn {
            lower_bound: 0.,
            primal_bound: None,
            iteration: 0,
        });
        assert!(!out.end);
        out = visitor.next(VisitorIn {
            lower_bound: 1.,
            primal_bound: None,
            iteration: 1,
        });
        assert!(!out.end);
        out = visitor.next(VisitorIn {
            lower_bound: 2.,
            primal_bound: None,
            iteration: 2,
        });
        assert!(out.end);
    }

    #[test]
    fn stops_on_stalled_lower_bound() {
        let mut options = SolverOptions::default();
        options.set_max_iterations(1000);
        options.set_min_dual_improvement(0.5);
        options.set_min_dual_improvement_interval(2);
        let mut visitor = Visitor::new(&options);

        visitor.next(VisitorIn { lower_bound: 0., primal_bound: None, iteration: 0 });
        visitor.next(VisitorIn { lower_bound: 0.1, primal_bound: None, iteration: 1 });
        let out = visitor.next(VisitorIn { lower_bound: 0.2, primal_bound: None, iteration: 2 });
        assert!(out.end);
    }

    #[test]
    fn tighten_respects_start_iteration_and_interval() {
        let mut options = SolverOptions::default();
        options.set_max_iterations(1000);
        options.set_tighten(true);
        options.set_tighten_iteration(2);
        options.set_tighten_interval(2);
        let visitor = Visitor::new(&options);

        assert!(!visitor.should_tighten(0));
        assert!(!visitor.should_tighten(1));
        assert!(visitor.should_tighten(2));
        assert!(!visitor.should_tighten(3));
        assert!(visitor.should_tighten(4));
    }
}
