//! metaprep code-generation toolkit.
//!
//! The primitives a directive uses to write C-family source text:
//!
//! - [`Emitter::line`] / [`Emitter::blank`]: dedented, indented line emission
//! - [`Emitter::enter`] / [`Emitter::exit`] / [`Emitter::scoped`]: blocks whose
//!   delimiters are inferred from the header by [`scope::infer`]
//! - [`Emitter::enums`]: enumerations with a member count
//! - [`Emitter::define`]: macros, including overloaded macro families
//! - [`Emitter::lut`]: `static const` lookup tables
//! - [`Emitter::ifs`]: conditional chains
//! - [`Emitter::section`]: headers emitted only when something follows them
//!
//! Every primitive writes into the one [`Emitter`] of the run; the target
//! text is never parsed back. Callers that own the emitter and run their own
//! callbacks implement [`EmitContext`] and use [`with_scope`],
//! [`with_section`] and [`chain()`].

pub mod chain;
pub mod emitter;
pub mod enums;
pub mod error;
pub mod lut;
pub mod macros;
pub mod scope;

pub use chain::{chain, ChainStyle};
pub use emitter::{with_scope, with_section, EmitContext, Emitter, Generated, OutputTarget};
pub use enums::{CountStyle, EnumDef, EnumMember};
pub use error::{CodegenError, CodegenResult};
pub use lut::{Lut, LutMember, LutRow};
pub use macros::{MacroDef, OverloadGroup};
pub use scope::{OpenScope, Scope};
