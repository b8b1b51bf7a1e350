pub mod entities;
pub mod interfaces;
pub mod repositories;
pub mod value_objects;
