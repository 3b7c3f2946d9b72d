//! Transformation engine: the row-program DSL and its executor.
//!
//! - [`ops`] - cell-level value operations
//! - [`program`] - the row-program DSL (steps, expressions, conditions)
//! - [`executor`] - compiles a descriptor's logic and runs it over a dataset

pub mod executor;
pub mod ops;
pub mod program;

pub use executor::{execute, ExecutionReport, RowFault};
pub use ops::{operations_description, Operation};
pub use program::{
    example_program, AggregateFunc, CompiledProgram, Condition, EvalContext, ProgramError,
    RowProgram, RowStep, ValueExpr,
};
