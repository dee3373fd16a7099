pub mod builder;
pub mod function;
