pub mod demo;
pub mod firebase;
