//! Leaf nodes of the fault tree and common-cause failure groups.

use std::fmt;
use std::str::FromStr;

use crate::expression::Expr;
use crate::gate::GateId;

index_vec::define_index_type! {
    pub struct BasicEventId = usize;
}

index_vec::define_index_type! {
    pub struct HouseEventId = usize;
}

index_vec::define_index_type! {
    pub struct UndefinedEventId = usize;
}

/// Behavior shared by every node that can appear as a gate argument.
/// Parent back-edges are non-owning gate indices into the container.
pub trait Node {
    fn name(&self) -> &str;
    fn parents(&self) -> &[GateId];
    fn parents_mut(&mut self) -> &mut Vec<GateId>;

    fn add_parent(&mut self, gate: GateId) {
        let parents = self.parents_mut();
        if !parents.contains(&gate) {
            parents.push(gate);
        }
    }

    /// Determines if the node is parentless.
    fn is_orphan(&self) -> bool {
        self.parents().is_empty()
    }

    /// Indicates if this node appears in several places.
    fn is_common(&self) -> bool {
        self.parents().len() > 1
    }

    fn num_parents(&self) -> usize {
        self.parents().len()
    }
}

macro_rules! impl_node {
    ($type:ty) => {
        impl Node for $type {
            fn name(&self) -> &str {
                &self.name
            }
            fn parents(&self) -> &[GateId] {
                &self.parents
            }
            fn parents_mut(&mut self) -> &mut Vec<GateId> {
                &mut self.parents
            }
        }
    };
}

/// An independent component failure with a probability.
#[derive(Debug, Clone)]
pub struct BasicEvent {
    pub name: String,
    pub prob: Expr,
    pub parents: Vec<GateId>,
}

impl BasicEvent {
    pub fn new(name: impl Into<String>, prob: Expr) -> Self {
        BasicEvent {
            name: name.into(),
            prob,
            parents: Vec::new(),
        }
    }
}

impl_node!(BasicEvent);

/// A boolean constant leaf modelling a configuration switch.
#[derive(Debug, Clone)]
pub struct HouseEvent {
    pub name: String,
    pub state: bool,
    pub parents: Vec<GateId>,
}

impl HouseEvent {
    pub fn new(name: impl Into<String>, state: bool) -> Self {
        HouseEvent {
            name: name.into(),
            state,
            parents: Vec::new(),
        }
    }
}

impl_node!(HouseEvent);

/// A name referenced by a gate but never declared. Tolerated with a
/// warning in the shorthand flow, rejected in the strict XML flow.
#[derive(Debug, Clone)]
pub struct UndefinedEvent {
    pub name: String,
    pub parents: Vec<GateId>,
}

impl UndefinedEvent {
    pub fn new(name: impl Into<String>) -> Self {
        UndefinedEvent {
            name: name.into(),
            parents: Vec::new(),
        }
    }
}

impl_node!(UndefinedEvent);

/// The factor decomposition model of a CCF group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CcfModel {
    Mgl,
    Alpha,
    Beta,
    Phi,
}

impl CcfModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CcfModel::Mgl => "MGL",
            CcfModel::Alpha => "alpha-factor",
            CcfModel::Beta => "beta-factor",
            CcfModel::Phi => "phi-factor",
        }
    }
}

impl FromStr for CcfModel {
    type Err = ();

    fn from_str(input: &str) -> Result<CcfModel, Self::Err> {
        match input.to_ascii_lowercase().as_str() {
            "mgl" => Ok(CcfModel::Mgl),
            "alpha" | "alpha-factor" => Ok(CcfModel::Alpha),
            "beta" | "beta-factor" => Ok(CcfModel::Beta),
            "phi" | "phi-factor" => Ok(CcfModel::Phi),
            _ => Err(()),
        }
    }
}

impl fmt::Display for CcfModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A set of basic events that may fail together, with model factors.
/// Members are excluded from the model-data block on serialization.
#[derive(Debug, Clone)]
pub struct CcfGroup {
    pub name: String,
    pub model: CcfModel,
    pub members: Vec<BasicEventId>,
    pub prob: Expr,
    pub factors: Vec<f64>,
}
