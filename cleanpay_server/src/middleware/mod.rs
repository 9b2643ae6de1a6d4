mod operator;

pub use operator::{OperatorMiddlewareFactory, OperatorMiddlewareService};
