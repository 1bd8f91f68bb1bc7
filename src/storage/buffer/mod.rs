pub mod lruk;
