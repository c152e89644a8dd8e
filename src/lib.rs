pub mod compile;
pub mod core;
pub mod graph;
pub mod input;
pub mod model;

pub use crate::compile::bucket_tree::{Bucket, CompileBucketTree};
pub use crate::compile::function::AomddFunction;
pub use crate::compile::vbe::BucketTree;
pub use crate::core::manager::{NodeManager, Operation, Operator};
pub use crate::core::node::{AndNode, MetaId, MetaNode, ONE, ZERO};
pub use crate::graph::primal::Graph;
pub use crate::graph::pseudo_tree::PseudoTree;
pub use crate::model::scope::{Assignment, Scope, Var};
pub use crate::model::table::TableFunction;
