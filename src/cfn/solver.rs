#![allow(dead_code)]

use std::time::Duration;

use crate::cfn::cost_function_network::CostFunctionNetwork;
use crate::cfn::relaxation::Relaxation;
use crate::messages::message_trait::SendingMode;

/// Which scaling is applied to a node's reparametrization update before it is
/// subtracted into the adjacent messages: `Anisotropic` weighs each incoming/outgoing
/// edge per the SRMP paper's omega computation (the default), `Uniform` splits the
/// update evenly across all of a node's edges regardless of the forward/backward
/// split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReparametrizationMode {
    Anisotropic,
    Uniform,
}

// Stores options to a cost function network solver
pub struct SolverOptions {
    max_iterations: usize, // maximum number of iterations
    max_memory_mb: Option<usize>, // soft cap on working-set memory; None = unbounded
    time_max: Duration,    // maximum allowed time limit
    eps: f64,              // precision for tracking lower bound improvement
    compute_solution_period: usize, // number of iterations between solution recomputations
                           // if compute_solution_period = 0, the solution is never computed
    lower_bound_computation_interval: usize, // iterations between lower bound recomputations
    min_dual_improvement: f64, // minimum lower bound gain required over the averaging window
    min_dual_improvement_interval: usize, // width (in iterations) of that averaging window
    standard_reparametrization: ReparametrizationMode,
    rounding_reparametrization: ReparametrizationMode,
    sending_mode: SendingMode, // which message-sending schedule the solver runs (SRMP or MPLP)
    tighten: bool,                 // whether cycle/odd-wheel tightening is enabled at all
    tighten_iteration: usize,      // iteration at which tightening may first trigger
    tighten_interval: usize,       // iterations between tightening attempts once triggered
    tighten_constraints_max: Option<usize>, // cap on constraints added per tightening round
    tighten_constraints_percentage: Option<f64>, // alternative cap, as a fraction of candidates
    tighten_min_dual_increase: f64, // minimum dual gain a tightening round must justify its cost
    tighten_min_dual_decrease_factor: f64, // shrinks the above threshold across rounds
}

impl SolverOptions {
    // Returns default options
    pub fn default() -> Self {
        SolverOptions {
            max_iterations: 10000,
            max_memory_mb: None,
            time_max: Duration::new(20 * 60, 0), // 20 minutes
            eps: 1e-8,
            compute_solution_period: 1,
            lower_bound_computation_interval: 1,
            min_dual_improvement: 1e-8,
            min_dual_improvement_interval: 1,
            standard_reparametrization: ReparametrizationMode::Anisotropic,
            rounding_reparametrization: ReparametrizationMode::Anisotropic,
            sending_mode: SendingMode::Srmp,
            tighten: false,
            tighten_iteration: 0,
            tighten_interval: 1,
            tighten_constraints_max: None,
            tighten_constraints_percentage: None,
            tighten_min_dual_increase: 1e-8,
            tighten_min_dual_decrease_factor: 1.0,
        }
    }

    // Sets the maximum number of iterations
    pub fn set_max_iterations(&mut self, value: usize) -> &mut Self {
        self.max_iterations = value;
        self
    }

    // Sets the soft memory cap, in megabytes
    pub fn set_max_memory_mb(&mut self, value: usize) -> &mut Self {
        self.max_memory_mb = Some(value);
        self
    }

    // Sets the time limit
    pub fn set_time_max(&mut self, value: Duration) -> &mut Self {
        self.time_max = value;
        self
    }

    // Sets the precision for tracking lower bound improvement
    pub fn set_eps(&mut self, value: f64) -> &mut Self {
        self.eps = value;
        self
    }

    // Sets the number of iterations between solution recomputations
    pub fn set_compute_solution_period(&mut self, value: usize) -> &mut Self {
        self.compute_solution_period = value;
        self
    }

    // Sets the number of iterations between lower bound recomputations
    pub fn set_lower_bound_computation_interval(&mut self, value: usize) -> &mut Self {
        self.lower_bound_computation_interval = value;
        self
    }

    // Sets the minimum required lower bound gain over the averaging window
    pub fn set_min_dual_improvement(&mut self, value: f64) -> &mut Self {
        self.min_dual_improvement = value;
        self
    }

    // Sets the width, in iterations, of the minimum-dual-improvement averaging window
    pub fn set_min_dual_improvement_interval(&mut self, value: usize) -> &mut Self {
        self.min_dual_improvement_interval = value;
        self
    }

    // Sets the reparametrization mode used during ordinary message passing
    pub fn set_standard_reparametrization(&mut self, value: ReparametrizationMode) -> &mut Self {
        self.standard_reparametrization = value;
        self
    }

    // Sets the reparametrization mode used while extracting a rounded primal solution
    pub fn set_rounding_reparametrization(&mut self, value: ReparametrizationMode) -> &mut Self {
        self.rounding_reparametrization = value;
        self
    }

    // Sets which message-sending schedule the solver runs: SRMP's anisotropic
    // forward/backward sweeps, or MPLP's symmetric collect-then-average round
    pub fn set_sending_mode(&mut self, value: SendingMode) -> &mut Self {
        self.sending_mode = value;
        self
    }

    // Enables or disables cutting-plane tightening
    pub fn set_tighten(&mut self, value: bool) -> &mut Self {
        self.tighten = value;
        self
    }

    // Sets the iteration at which tightening may first trigger
    pub fn set_tighten_iteration(&mut self, value: usize) -> &mut Self {
        self.tighten_iteration = value;
        self
    }

    // Sets the number of iterations between tightening attempts
    pub fn set_tighten_interval(&mut self, value: usize) -> &mut Self {
        self.tighten_interval = value;
        self
    }

    // Caps the number of constraints added in a single tightening round
    pub fn set_tighten_constraints_max(&mut self, value: usize) -> &mut Self {
        self.tighten_constraints_max = Some(value);
        self
    }

    // Caps the number of constraints added, as a fraction of tightening candidates found
    pub fn set_tighten_constraints_percentage(&mut self, value: f64) -> &mut Self {
        self.tighten_constraints_percentage = Some(value);
        self
    }

    // Sets the minimum dual increase a tightening round must justify its cost
    pub fn set_tighten_min_dual_increase(&mut self, value: f64) -> &mut Self {
        self.tighten_min_dual_increase = value;
        self
    }

    // Sets the per-round shrink factor applied to the min-dual-increase threshold
    pub fn set_tighten_min_dual_decrease_factor(&mut self, value: f64) -> &mut Self {
        self.tighten_min_dual_decrease_factor = value;
        self
    }

    // Returns the maximum number of iterations
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    // Returns the soft memory cap, in megabytes
    pub fn max_memory_mb(&self) -> Option<usize> {
        self.max_memory_mb
    }

    // Returns the time limit
    pub fn time_max(&self) -> Duration {
        self.time_max
    }

    // Returns the precision for tracking lower bound improvement
    pub fn eps(&self) -> f64 {
        self.eps
    }

    // Returns the number of iterations between solution recomputations
    pub fn compute_solution_period(&self) -> usize {
        self.compute_solution_period
    }

    // Returns the number of iterations between lower bound recomputations
    pub fn lower_bound_computation_interval(&self) -> usize {
        self.lower_bound_computation_interval
    }

    // Returns the minimum required lower bound gain over the averaging window
    pub fn min_dual_improvement(&self) -> f64 {
        self.min_dual_improvement
    }

    // Returns the width, in iterations, of the minimum-dual-improvement averaging window
    pub fn min_dual_improvement_interval(&self) -> usize {
        self.min_dual_improvement_interval
    }

    // Returns the reparametrization mode used during ordinary message passing
    pub fn standard_reparametrization(&self) -> ReparametrizationMode {
        self.standard_reparametrization
    }

    // Returns the reparametrization mode used while extracting a rounded primal solution
    pub fn rounding_reparametrization(&self) -> ReparametrizationMode {
        self.rounding_reparametrization
    }

    // Returns which message-sending schedule the solver runs
    pub fn sending_mode(&self) -> SendingMode {
        self.sending_mode
    }

    // Returns whether cutting-plane tightening is enabled
    pub fn tighten(&self) -> bool {
        self.tighten
    }

    // Returns the iteration at which tightening may first trigger
    pub fn tighten_iteration(&self) -> usize {
        self.tighten_iteration
    }

    // Returns the number of iterations between tightening attempts
    pub fn tighten_interval(&self) -> usize {
        self.tighten_interval
    }

    // Returns the cap on constraints added in a single tightening round, if any
    pub fn tighten_constraints_max(&self) -> Option<usize> {
        self.tighten_constraints_max
    }

    // Returns the cap on constraints added, as a fraction of candidates, if any
    pub fn tighten_constraints_percentage(&self) -> Option<f64> {
        self.tighten_constraints_percentage
    }

    // Returns the minimum dual increase a tightening round must justify its cost
    pub fn tighten_min_dual_increase(&self) -> f64 {
        self.tighten_min_dual_increase
    }

    // Returns the per-round shrink factor applied to the min-dual-increase threshold
    pub fn tighten_min_dual_decrease_factor(&self) -> f64 {
        self.tighten_min_dual_decrease_factor
    }
}

// Interface for cost function network solvers
pub trait Solver<'a> {
    // Initializes the solver with the given cost function network and relaxation
    fn init(cfn: &'a CostFunctionNetwork, relaxation: &'a Relaxation) -> Self;

    // Executes the solver with the given options
    fn run(self, options: &SolverOptions) -> Self;
}
