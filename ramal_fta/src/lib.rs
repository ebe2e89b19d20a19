//! Fault tree construction, validation and serialization.
//!
//! The crate builds an in-memory fault tree from the shorthand notation
//! or from an Open-PSA MEF document, validates it (unique names,
//! resolvable references, a single root, no cycles), and serializes it
//! back to canonical MEF XML, to the Aralia text form, or to a JSON
//! report for the quantification engine.

pub mod aralia;
pub mod error;
pub mod event;
pub mod expression;
pub mod fault_tree;
pub mod gate;
pub mod name;
pub mod report;
pub mod shorthand;
pub mod xml;

pub use error::{Error, FaultTreeError, ParseError, ParseKind, XmlError};
pub use fault_tree::FaultTree;
