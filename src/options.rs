use chrono::NaiveDateTime;
use std::sync::Arc;

/// How `==` / `!=` behave across operand types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EqualityCoercion {
    /// Mixed non-string operands are a type error; anything involving a
    /// string is compared as strings after stringification.
    Strict,
    /// Strings that parse as decimals compare numerically; mixed
    /// non-string operands are a type error.
    NumberFriendly,
    /// Everything falls back to stringified comparison when the typed
    /// rules do not apply.
    Permissive,
    /// Two strings always compare as strings; a strict number against a
    /// string coerces the string, falling back to string comparison.
    MixedNumericOnly,
}

/// How `+` behaves when a string operand is present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StringConcatMode {
    /// Any string operand turns `+` into concatenation.
    PreferStringIfAnyString,
    /// If both operands parse as decimals, add them; otherwise concatenate.
    PreferNumericIfParsable,
}

/// Midpoint rule for Set-commit rounding, mirroring the two strategies
/// `rust_decimal` supports for half-way cases.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidpointRounding {
    AwayFromZero,
    ToEven,
}

/// Case sensitivity for string equality and the prefix/suffix/contains
/// built-ins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StringComparison {
    IgnoreCase,
    CaseSensitive,
}

/// Host-supplied predicate that replaces the strict field-name check.
/// Runs on the original spelling before any case folding.
pub type FieldNameValidator = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Engine configuration. Constructed once, before the engine; treated as
/// immutable while executions are in flight.
#[derive(Clone)]
pub struct Options {
    /// chrono strftime pattern used by the built-in datetime parsers and
    /// formatters.
    pub date_time_format: String,
    /// Enable `//` line and `/* */` block comments in scripts.
    pub enable_comments: bool,
    /// Maximum expression/block recursion depth per execution.
    pub max_depth: u32,
    /// Maximum AST nodes per script; enforced at compile time.
    pub max_nodes: u32,
    /// Maximum evaluator node visits per execution.
    pub max_node_visits: u32,
    /// Wall-clock budget per execution in milliseconds; 0 disables.
    pub timeout_milliseconds: u64,
    /// Case-fold field names on lookup.
    pub case_insensitive_field_names: bool,
    /// Case sensitivity for string equality and string built-ins.
    pub string_comparison: StringComparison,
    /// Decimal places applied to numbers at Set-commit; `None` disables.
    pub rounding_digits: Option<u32>,
    /// Midpoint rule used with `rounding_digits`.
    pub midpoint_rounding: MidpointRounding,
    /// When a null reaches default stringification (string concatenation
    /// without a converter match), emit `""` instead of `"null"`.
    pub treat_null_string_as_empty: bool,
    /// Typed read of a null field as decimal yields 0.
    pub treat_null_decimal_as_zero: bool,
    /// Typed read of a null field as bool yields false.
    pub treat_null_bool_as_false: bool,
    /// Typed read of a null field as datetime yields this instant.
    pub null_date_time_default: Option<NaiveDateTime>,
    /// `now` evaluates in local time instead of UTC.
    pub now_use_local_time: bool,
    /// Enforce `[A-Za-z0-9_ ]+` on field names when no custom validator
    /// is set.
    pub strict_field_name_validation: bool,
    /// Custom field-name predicate; overrides the strict check.
    pub field_name_validator: Option<FieldNameValidator>,
    /// Budget for a single `RegexMatch` evaluation in milliseconds;
    /// 0 disables the guard.
    pub regex_timeout_milliseconds: u64,
    /// Equality behavior across operand types.
    pub equality_coercion: EqualityCoercion,
    /// `+` behavior when a string operand is present.
    pub string_concat: StringConcatMode,
    /// Cache compiled scripts keyed by verbatim source text.
    pub enable_compilation_cache: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            date_time_format: "%Y-%m-%d %H:%M:%S".to_string(),
            enable_comments: true,
            max_depth: 64,
            max_nodes: 2000,
            max_node_visits: 10_000,
            timeout_milliseconds: 0,
            case_insensitive_field_names: true,
            string_comparison: StringComparison::IgnoreCase,
            rounding_digits: None,
            midpoint_rounding: MidpointRounding::AwayFromZero,
            treat_null_string_as_empty: true,
            treat_null_decimal_as_zero: false,
            treat_null_bool_as_false: false,
            null_date_time_default: None,
            now_use_local_time: false,
            strict_field_name_validation: false,
            field_name_validator: None,
            regex_timeout_milliseconds: 0,
            equality_coercion: EqualityCoercion::NumberFriendly,
            string_concat: StringConcatMode::PreferStringIfAnyString,
            enable_compilation_cache: true,
        }
    }
}
