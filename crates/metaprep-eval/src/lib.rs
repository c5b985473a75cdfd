//! metaprep evaluator: runs directive bodies.
//!
//! A tree-walking interpreter over the meta-script AST. Each directive runs
//! against its own [`Env`]; the `Meta` handle forwards generation requests
//! to the run's [`metaprep_codegen::Emitter`].

pub mod builtins;
pub mod env;
pub mod error;
pub mod evaluator;
pub mod meta;
pub mod value;

pub use builtins::{Args, Builtin};
pub use env::Env;
pub use error::{ErrorKind, EvalError, EvalResult, FrameSite, TraceFrame};
pub use evaluator::{Evaluator, MAX_CALL_DEPTH, MAX_REPEAT_LEN};
pub use meta::META_METHODS;
pub use value::{Closure, Value};
