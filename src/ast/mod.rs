//! Owned syntax for machine configuration literals.
//!
//! - [`types`]: the [`Expr`] tree with per-node origins
//! - [`lower`]: tree-sitter to [`Expr`] conversion
//! - [`locate`]: discovery of `createMachine`-style calls

pub mod locate;
pub mod lower;
pub mod types;

pub use locate::{find_machines, MachineLiteral};
pub use types::{
    get_prop, get_prop_mut, get_value, get_value_mut, is_valid_identifier, remove_prop, set_value, Expr,
    ExprKind, Origin, PropKey, Property, Span,
};
