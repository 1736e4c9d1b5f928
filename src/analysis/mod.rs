//! Whole-group analysis passes built on top of the interpreter and the class model

mod call_graph;

pub use call_graph::*;
