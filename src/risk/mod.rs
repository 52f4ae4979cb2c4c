pub mod kelly;
pub mod limits;
