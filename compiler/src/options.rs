use crate::sql::{ClickHouse, Dialect};

pub struct Options {
    pub dialect: Box<dyn Dialect + Send + Sync>,
    /// Hit-list size when the request does not carry `size`.
    pub default_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            dialect: Box::new(ClickHouse()),
            default_size: 10,
        }
    }
}
