//! Factors that determine the complexity of the generated fault tree.
//!
//! The collection must be fully set up before generation: probability
//! bounds, common-event factors, size factors and gate weights, then a
//! final `calculate` for the derived quantities.

use rand::rngs::StdRng;
use rand::Rng;
use ramal_fta::gate::Operator;
use thiserror::Error;

/// Errors in configuring factors for the fault tree generation.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct FactorError(pub String);

/// Gate types in the fixed weight order.
const OPERATORS: [Operator; 5] = [
    Operator::And,
    Operator::Or,
    Operator::Atleast,
    Operator::Not,
    Operator::Xor,
];

/// Minimum argument counts for AND, OR, K/N, NOT, XOR.
const MIN_ARGS: [f64; 5] = [2.0, 2.0, 3.0, 1.0, 2.0];

const MAX_COMMON: f64 = 0.9;
const MAX_PARENT: f64 = 100.0;

#[derive(Debug, Clone)]
pub struct Factors {
    pub num_args: f64,
    pub num_basic: usize,
    pub num_house: usize,
    pub num_ccf: usize,
    pub common_b: f64,
    pub common_g: f64,
    pub parents_b: f64,
    pub parents_g: f64,
    pub min_prob: f64,
    pub max_prob: f64,
    weights: Vec<f64>,
    cum_dist: Vec<f64>,
    max_args: f64,
    percent_basic: f64,
    percent_gate: f64,
    num_gate: Option<usize>,
}

impl Default for Factors {
    fn default() -> Self {
        Factors {
            num_args: 0.0,
            num_basic: 0,
            num_house: 0,
            num_ccf: 0,
            common_b: 0.0,
            common_g: 0.0,
            parents_b: 0.0,
            parents_g: 0.0,
            min_prob: 0.0,
            max_prob: 1.0,
            weights: Vec::new(),
            cum_dist: Vec::new(),
            max_args: 0.0,
            percent_basic: 0.0,
            percent_gate: 0.0,
            num_gate: None,
        }
    }
}

impl Factors {
    pub fn new() -> Self {
        Factors::default()
    }

    /// Sets the probability boundaries for basic events.
    pub fn set_min_max_prob(&mut self, min_value: f64, max_value: f64) -> Result<(), FactorError> {
        if !(0.0..=1.0).contains(&min_value) {
            return Err(FactorError("min probability must be in [0, 1] range".into()));
        }
        if !(0.0..=1.0).contains(&max_value) {
            return Err(FactorError("max probability must be in [0, 1] range".into()));
        }
        if min_value > max_value {
            return Err(FactorError("min probability > max probability".into()));
        }
        self.min_prob = min_value;
        self.max_prob = max_value;
        Ok(())
    }

    /// Sets the factors for the number of common events.
    pub fn set_common_event_factors(
        &mut self,
        common_b: f64,
        common_g: f64,
        parents_b: f64,
        parents_g: f64,
    ) -> Result<(), FactorError> {
        if common_b <= 0.0 || common_b > MAX_COMMON {
            return Err(FactorError(format!("common_b not in (0, {MAX_COMMON}]")));
        }
        if common_g <= 0.0 || common_g > MAX_COMMON {
            return Err(FactorError(format!("common_g not in (0, {MAX_COMMON}]")));
        }
        if !(2.0..=MAX_PARENT).contains(&parents_b) {
            return Err(FactorError(format!("parents_b not in [2, {MAX_PARENT}]")));
        }
        if !(2.0..=MAX_PARENT).contains(&parents_g) {
            return Err(FactorError(format!("parents_g not in [2, {MAX_PARENT}]")));
        }
        self.common_b = common_b;
        self.common_g = common_g;
        self.parents_b = parents_b;
        self.parents_g = parents_g;
        Ok(())
    }

    /// Sets the size factors.
    pub fn set_num_factors(
        &mut self,
        num_args: f64,
        num_basic: usize,
        num_house: usize,
        num_ccf: usize,
    ) -> Result<(), FactorError> {
        if num_args < 2.0 {
            return Err(FactorError(
                "avg. # of gate arguments can't be less than 2".into(),
            ));
        }
        if num_basic < 1 {
            return Err(FactorError("# of basic events must be more than 0".into()));
        }
        if num_house >= num_basic {
            return Err(FactorError("too many house events".into()));
        }
        if num_ccf as f64 > num_basic as f64 / num_args {
            return Err(FactorError("too many CCF groups".into()));
        }
        self.num_args = num_args;
        self.num_basic = num_basic;
        self.num_house = num_house;
        self.num_ccf = num_ccf;
        Ok(())
    }

    /// Updates gate type weights in the [AND, OR, K/N, NOT, XOR] order.
    /// Missing trailing weights are assumed to be 0.
    pub fn set_gate_weights(&mut self, weights: Vec<f64>) -> Result<(), FactorError> {
        if weights.is_empty() {
            return Err(FactorError("no weights are provided".into()));
        }
        if weights.iter().any(|&weight| weight < 0.0) {
            return Err(FactorError("weights cannot be negative".into()));
        }
        if weights.len() > OPERATORS.len() {
            return Err(FactorError("too many weights are provided".into()));
        }
        let total: f64 = weights.iter().sum();
        if total == 0.0 {
            return Err(FactorError("at least one non-zero weight is needed".into()));
        }
        if weights.len() > 3 && weights.iter().take(3).sum::<f64>() == 0.0 {
            return Err(FactorError("cannot work with only XOR or NOT gates".into()));
        }
        let mut padded = weights;
        padded.resize(OPERATORS.len(), 0.0);
        self.cum_dist = padded
            .iter()
            .scan(0.0, |acc, &weight| {
                *acc += weight / total;
                Some(*acc)
            })
            .collect();
        self.weights = padded;
        Ok(())
    }

    pub fn gate_weights(&self) -> &[f64] {
        &self.weights
    }

    /// Derives the sampling quantities. Must run after all the public
    /// factors are initialized.
    pub fn calculate(&mut self) {
        debug_assert!(!self.weights.is_empty(), "weights are not set");
        let total: f64 = self.weights.iter().sum();
        let norm: Vec<f64> = self.weights.iter().map(|w| w / total).collect();
        self.max_args = Self::calculate_max_args(self.num_args, &norm);
        let g_factor = 1.0 - self.common_g + self.common_g / self.parents_g;
        let ratio = self.num_args * g_factor - 1.0;
        self.percent_basic = ratio / (1.0 + ratio);
        self.percent_gate = 1.0 / (1.0 + ratio);
    }

    /// The upper bound of the symmetric argument-count distribution
    /// that yields the requested average. NOT and XOR contribute
    /// constant arities; AND, OR and K/N vary.
    fn calculate_max_args(num_args: f64, weights: &[f64]) -> f64 {
        let const_contrib: f64 = MIN_ARGS[3..]
            .iter()
            .zip(&weights[3..])
            .map(|(args, weight)| args * weight)
            .sum();
        let var_contrib: f64 = MIN_ARGS[..3]
            .iter()
            .zip(&weights[..3])
            .map(|(args, weight)| args * weight)
            .sum();
        let var_weights: f64 = weights[..3].iter().sum();
        (2.0 * num_args - var_contrib - 2.0 * const_contrib) / var_weights
    }

    pub fn percent_gate(&self) -> f64 {
        self.percent_gate
    }

    /// Samples the gate operator from the weight distribution.
    pub fn random_operator(&self, rng: &mut StdRng) -> Operator {
        let sample: f64 = rng.gen();
        let position = self
            .cum_dist
            .iter()
            .position(|&bound| sample < bound)
            .unwrap_or(OPERATORS.len() - 1);
        OPERATORS[position]
    }

    /// Samples the argument count for the operator, together with the
    /// K number for combination gates.
    pub fn sample_num_args(
        &self,
        operator: Operator,
        rng: &mut StdRng,
    ) -> (usize, Option<usize>) {
        match operator {
            Operator::Not => return (1, None),
            Operator::Xor => return (2, None),
            _ => {}
        }
        let mut max_args = self.max_args.trunc() as usize;
        // Bernoulli correction for the fractional part.
        if rng.gen::<f64>() < self.max_args - max_args as f64 {
            max_args += 1;
        }
        if operator == Operator::Atleast {
            max_args = max_args.max(3);
            let num_args = rng.gen_range(3..=max_args);
            let k_num = rng.gen_range(2..=num_args - 1);
            return (num_args, Some(k_num));
        }
        (rng.gen_range(2..=max_args.max(2)), None)
    }

    /// Approximates the number of gates needed for the configured
    /// number of basic events.
    pub fn expected_num_gate(&self) -> usize {
        if let Some(num_gate) = self.num_gate {
            return num_gate;
        }
        let b_factor = 1.0 - self.common_b + self.common_b / self.parents_b;
        (self.num_basic as f64 / (self.percent_basic * self.num_args * b_factor)) as usize
    }

    /// Common basic events to pre-allocate so the average parent count
    /// comes out right.
    pub fn num_common_basics(&self, num_gate: usize) -> usize {
        (self.common_b * self.percent_basic * self.num_args * num_gate as f64 / self.parents_b)
            as usize
    }

    /// Common gates to pre-allocate, same reasoning.
    pub fn num_common_gates(&self, num_gate: usize) -> usize {
        (self.common_g * self.percent_gate * self.num_args * num_gate as f64 / self.parents_g)
            as usize
    }

    /// Constrains the total number of gates by recalibrating the
    /// common-event factors and the parent counts.
    pub fn constrain_num_gate(&mut self, num_gate: usize) -> Result<(), FactorError> {
        if num_gate < 1 {
            return Err(FactorError("# of gates can't be less than 1".into()));
        }
        if num_gate as f64 * self.num_args <= self.num_basic as f64 {
            return Err(FactorError(
                "not enough gates and avg. # of args to achieve the # of basic events".into(),
            ));
        }
        self.num_gate = Some(num_gate);
        let alpha = num_gate as f64 / self.num_basic as f64;
        let mut common = self.common_g.max(self.common_b);
        let min_common = 1.0 - (1.0 + alpha) / self.num_args / alpha;
        if common < min_common {
            common = ((min_common + 0.05) * 10.0).round() / 10.0;
        } else if common > 2.0 * min_common {
            common = 2.0 * min_common;
        }
        if !(common > 0.0 && common < 1.0) {
            return Err(FactorError(
                "the gate constraint produces an impossible common factor".into(),
            ));
        }
        self.common_g = common;
        self.common_b = common;
        let parents = 1.0 / (1.0 - min_common / common);
        if !(parents > 2.0) {
            return Err(FactorError(
                "the gate constraint produces too few parents for common nodes".into(),
            ));
        }
        self.parents_g = parents;
        self.parents_b = parents;
        Ok(())
    }
}
