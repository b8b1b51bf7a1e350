pub mod events;
pub mod stripe_client;
pub mod stripe_objects;
