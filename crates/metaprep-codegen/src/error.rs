//! Codegen error types.

use thiserror::Error;

/// Validation failures raised by the generation primitives.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodegenError {
    /// An enumeration was given no members.
    #[error("enumeration '{0}' has no members")]
    EmptyEnum(String),

    /// Two members of an enumeration share a name.
    #[error("enumeration '{enumeration}' has duplicate member '{member}'")]
    DuplicateEnumMember { enumeration: String, member: String },

    /// A count style name that is not one of `none`, `define`, `enum`, `constexpr`.
    #[error("unknown enumeration count style '{0}'; expected none, define, enum or constexpr")]
    UnknownCountStyle(String),

    /// Overloading was requested on a macro without a parameter list.
    #[error("overloading macro '{0}' needs a parameter list")]
    OverloadWithoutParams(String),

    /// An overload key is not one of the macro's parameters.
    #[error("overloading macro '{name}' on '{key}', which is not in its parameter list ({params})")]
    OverloadKeyNotParam {
        name: String,
        key: String,
        params: String,
    },

    /// An overload value cannot be pasted into a macro name.
    #[error("overload value '{value}' of macro '{name}' is not an identifier fragment")]
    InvalidOverloadValue { name: String, value: String },

    /// A later overload disagrees with the group's parameters or keys.
    #[error("cannot overload macro '{0}' with differing parameters or overloaded keys")]
    OverloadMismatch(String),

    /// Another directive already owns the overload group.
    #[error("macro '{name}' is already overloaded by the directive at {owner}")]
    OverloadOwned { name: String, owner: String },

    /// A lookup table with no rows.
    #[error("look-up table '{0}' has no rows")]
    EmptyLut(String),

    /// Two rows of a lookup table share an index.
    #[error("look-up table '{table}' has duplicate index of '{index}'")]
    DuplicateLutIndex { table: String, index: String },

    /// A row of a lookup table names a field twice.
    #[error("look-up table '{table}' has an entry with duplicate field of '{field}'")]
    DuplicateLutField { table: String, field: String },

    /// A member type was given although the table's element type is explicit.
    #[error("look-up table '{table}' has an explicit type, so member '{field}' cannot carry its own type")]
    TypedLutMember { table: String, field: String },

    /// A row or member that does not have one of the accepted shapes.
    #[error("look-up table '{table}': {reason}")]
    MalformedLut { table: String, reason: String },

    /// A conditional-chain style that is not `if`, `else if`, `#if` or `#elif`.
    #[error("unknown if-statement style '{0}'; expected 'if', 'else if', '#if' or '#elif'")]
    UnknownChainStyle(String),

    /// A trailing else body on a style whose branches do not chain.
    #[error("an 'otherwise' body needs the 'else if' or '#elif' style, not '{0}'")]
    OtherwiseWithoutChain(String),
}

/// Codegen result type alias.
pub type CodegenResult<T> = Result<T, CodegenError>;
