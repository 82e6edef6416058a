pub mod expr;
pub mod matcher;

pub use expr::{parse_expr, Expr};
pub use matcher::{compile_rule, match_rule, CompiledRule, DescendantIndexes, PathScope};
