pub mod edge;
pub mod ev;
