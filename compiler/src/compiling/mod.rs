mod aggregations;
mod date_math;
mod date_range;
mod predicate;
mod translator;

pub use translator::{ResponseShape, SearchPlan, Translator};
