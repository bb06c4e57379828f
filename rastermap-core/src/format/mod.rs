//! Fixed values shared by the layout and paging crates

pub mod constants;
