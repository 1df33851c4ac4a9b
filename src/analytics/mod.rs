pub mod aggregate;
pub mod scope;
pub mod window;
