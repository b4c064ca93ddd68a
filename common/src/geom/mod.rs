pub mod line;
pub mod point;
pub mod rect;
pub mod rtree;
