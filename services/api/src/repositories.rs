//! Repositories over the object store

pub mod images;

pub use images::ImageRepository;
