mod assign;

pub use assign::{Window, WindowSpec};
