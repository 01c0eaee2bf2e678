//! CP model definition.

use serde::{Deserialize, Serialize};

use super::variables::{BoolVar, BoolVarId, Domain, IntVar, IntVarId, IntervalId, IntervalVar, Literal};

/// A constraint in the CP model.
///
/// Every constraint is stated over variable indices of the owning model.
/// Enforcement literals make a constraint conditional: it only has to hold
/// when all of them are true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Constraint {
    /// At most one of the literals is true.
    AtMostOne {
        literals: Vec<Literal>,
    },

    /// If every enforcement literal is true, at least one of `literals` is.
    ///
    /// An empty `literals` list forbids the enforcement conjunction.
    BoolOr {
        enforcement: Vec<Literal>,
        literals: Vec<Literal>,
    },

    /// Present intervals in the set pairwise do not overlap.
    NoOverlap {
        intervals: Vec<IntervalId>,
    },

    /// If every enforcement literal is true, `var` takes a value of `domain`.
    AllowedValues {
        enforcement: Vec<Literal>,
        var: IntVarId,
        domain: Domain,
    },
}

/// Objective function over weighted literals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Objective {
    /// Maximize `Σ weight · [literal]`.
    Maximize { terms: Vec<(Literal, i64)> },
    /// Minimize `Σ weight · [literal]`.
    Minimize { terms: Vec<(Literal, i64)> },
}

impl Objective {
    /// Terms rewritten so that larger is better.
    pub fn maximization_terms(&self) -> Vec<(Literal, i64)> {
        match self {
            Objective::Maximize { terms } => terms.clone(),
            Objective::Minimize { terms } => terms.iter().map(|&(l, w)| (l, -w)).collect(),
        }
    }

    /// Whether the objective is a minimization.
    pub fn is_minimize(&self) -> bool {
        matches!(self, Objective::Minimize { .. })
    }
}

/// Reference to a decision variable of either kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarRef {
    Bool(BoolVarId),
    Int(IntVarId),
}

/// A constraint programming model.
///
/// Variables are created through the model, which records their creation
/// order. Solvers may use that order as their branching order, so builders
/// should create the variables of one decision unit together.
///
/// # Examples
///
/// ```
/// use u_timetable::cp::{CpModel, Domain};
///
/// let mut model = CpModel::new("example", 100);
/// let present = model.new_bool_var("present");
/// let start = model.new_int_var("start", Domain::from_ranges(&[(0, 40)]));
/// let a = model.new_optional_interval("a", start, 60, present.lit());
/// let fixed = model.new_int_var("fixed_start", Domain::fixed(0));
/// let b = model.new_interval("b", fixed, 30);
/// model.add_no_overlap(vec![a, b]);
/// model.maximize(vec![(present.lit(), 1)]);
/// assert!(model.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpModel {
    /// Model name.
    pub name: String,
    /// Planning horizon (exclusive upper bound on time).
    pub horizon: i64,
    /// Boolean variables.
    pub bool_vars: Vec<BoolVar>,
    /// Integer variables.
    pub int_vars: Vec<IntVar>,
    /// Interval variables.
    pub intervals: Vec<IntervalVar>,
    /// Constraints.
    pub constraints: Vec<Constraint>,
    /// Objective function.
    pub objective: Option<Objective>,
    /// Variables in creation order.
    pub variable_order: Vec<VarRef>,
}

impl CpModel {
    /// Creates a new empty model.
    pub fn new(name: impl Into<String>, horizon: i64) -> Self {
        Self {
            name: name.into(),
            horizon,
            bool_vars: Vec::new(),
            int_vars: Vec::new(),
            intervals: Vec::new(),
            constraints: Vec::new(),
            objective: None,
            variable_order: Vec::new(),
        }
    }

    /// Adds a boolean variable.
    pub fn new_bool_var(&mut self, name: impl Into<String>) -> BoolVarId {
        self.push_bool(BoolVar::new(name))
    }

    /// Adds a boolean variable fixed to `value`.
    pub fn new_constant(&mut self, name: impl Into<String>, value: bool) -> BoolVarId {
        self.push_bool(BoolVar::fixed(name, value))
    }

    fn push_bool(&mut self, var: BoolVar) -> BoolVarId {
        let id = BoolVarId(self.bool_vars.len());
        self.bool_vars.push(var);
        self.variable_order.push(VarRef::Bool(id));
        id
    }

    /// Adds an integer variable.
    pub fn new_int_var(&mut self, name: impl Into<String>, domain: Domain) -> IntVarId {
        let id = IntVarId(self.int_vars.len());
        self.int_vars.push(IntVar::new(name, domain));
        self.variable_order.push(VarRef::Int(id));
        id
    }

    /// Adds an always-present fixed-size interval.
    pub fn new_interval(&mut self, name: impl Into<String>, start: IntVarId, size: i64) -> IntervalId {
        self.push_interval(IntervalVar::new(name, start, size))
    }

    /// Adds a fixed-size interval that is present iff `presence` is true.
    pub fn new_optional_interval(
        &mut self,
        name: impl Into<String>,
        start: IntVarId,
        size: i64,
        presence: Literal,
    ) -> IntervalId {
        self.push_interval(IntervalVar::new(name, start, size).as_optional(presence))
    }

    fn push_interval(&mut self, var: IntervalVar) -> IntervalId {
        let id = IntervalId(self.intervals.len());
        self.intervals.push(var);
        id
    }

    /// Adds a constraint.
    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn add_at_most_one(&mut self, literals: Vec<Literal>) {
        self.constraints.push(Constraint::AtMostOne { literals });
    }

    /// At least one literal is true.
    pub fn add_bool_or(&mut self, literals: Vec<Literal>) {
        self.add_enforced_bool_or(Vec::new(), literals);
    }

    /// If all of `enforcement` hold, at least one of `literals` holds.
    pub fn add_enforced_bool_or(&mut self, enforcement: Vec<Literal>, literals: Vec<Literal>) {
        self.constraints.push(Constraint::BoolOr {
            enforcement,
            literals,
        });
    }

    /// `a ⇒ b`
    pub fn add_implication(&mut self, a: Literal, b: Literal) {
        self.add_enforced_bool_or(vec![a], vec![b]);
    }

    /// The conjunction of `literals` is false.
    pub fn add_forbidden(&mut self, literals: Vec<Literal>) {
        self.add_enforced_bool_or(literals, Vec::new());
    }

    pub fn add_no_overlap(&mut self, intervals: Vec<IntervalId>) {
        self.constraints.push(Constraint::NoOverlap { intervals });
    }

    /// If all of `enforcement` hold, `var ∈ domain`.
    pub fn add_allowed_values(&mut self, enforcement: Vec<Literal>, var: IntVarId, domain: Domain) {
        self.constraints.push(Constraint::AllowedValues {
            enforcement,
            var,
            domain,
        });
    }

    pub fn maximize(&mut self, terms: Vec<(Literal, i64)>) {
        self.objective = Some(Objective::Maximize { terms });
    }

    pub fn minimize(&mut self, terms: Vec<(Literal, i64)>) {
        self.objective = Some(Objective::Minimize { terms });
    }

    /// Validates the model for consistency.
    ///
    /// Checks that all referenced variables exist and sizes are non-negative.
    pub fn validate(&self) -> Result<(), String> {
        for (i, interval) in self.intervals.iter().enumerate() {
            if interval.start.0 >= self.int_vars.len() {
                return Err(format!("interval {i} references undefined start variable"));
            }
            if interval.size < 0 {
                return Err(format!("interval {} has negative size", interval.name));
            }
            if let Some(p) = interval.presence {
                self.check_literal(p)?;
            }
        }

        for constraint in &self.constraints {
            match constraint {
                Constraint::AtMostOne { literals } => {
                    for &l in literals {
                        self.check_literal(l)?;
                    }
                }
                Constraint::BoolOr {
                    enforcement,
                    literals,
                } => {
                    for &l in enforcement.iter().chain(literals) {
                        self.check_literal(l)?;
                    }
                }
                Constraint::NoOverlap { intervals } => {
                    for id in intervals {
                        if id.0 >= self.intervals.len() {
                            return Err(format!("undefined interval: {}", id.0));
                        }
                    }
                }
                Constraint::AllowedValues {
                    enforcement, var, ..
                } => {
                    for &l in enforcement {
                        self.check_literal(l)?;
                    }
                    if var.0 >= self.int_vars.len() {
                        return Err(format!("undefined integer variable: {}", var.0));
                    }
                }
            }
        }

        if let Some(objective) = &self.objective {
            for (l, _) in objective.maximization_terms() {
                self.check_literal(l)?;
            }
        }
        Ok(())
    }

    fn check_literal(&self, literal: Literal) -> Result<(), String> {
        if literal.var.0 >= self.bool_vars.len() {
            return Err(format!("undefined boolean variable: {}", literal.var.0));
        }
        Ok(())
    }

    pub fn bool_var(&self, id: BoolVarId) -> &BoolVar {
        &self.bool_vars[id.0]
    }

    pub fn int_var(&self, id: IntVarId) -> &IntVar {
        &self.int_vars[id.0]
    }

    pub fn interval(&self, id: IntervalId) -> &IntervalVar {
        &self.intervals[id.0]
    }

    /// Returns the number of boolean variables.
    pub fn bool_var_count(&self) -> usize {
        self.bool_vars.len()
    }

    /// Returns the number of integer variables.
    pub fn int_var_count(&self) -> usize {
        self.int_vars.len()
    }

    /// Returns the number of interval variables.
    pub fn interval_count(&self) -> usize {
        self.intervals.len()
    }

    /// Returns the number of constraints.
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }
}
