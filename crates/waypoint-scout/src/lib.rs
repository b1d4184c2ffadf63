pub mod budget;
pub mod decision;
pub mod evaluator;
pub mod graph;
pub mod introspector;
pub mod relevance;
pub mod safety;
pub mod scorer;
pub mod scout;

pub use budget::BudgetController;
pub use decision::DecisionEngine;
pub use evaluator::PathEvaluator;
pub use graph::{GraphApi, GraphEdge, GraphState, RegistryGraphApi};
pub use introspector::Introspector;
pub use safety::SafetyController;
pub use scorer::{ComponentFn, PathScorer, ScoringInput};
pub use scout::{Scout, ScoutResult, ScoutStatus, ScoutTrace};
