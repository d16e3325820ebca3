/// Wire types shared between the store-facing API handlers and clients.
pub mod api;
pub mod image;
pub mod models;
