#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod evaluate;
pub mod policy;

pub use self::{
    evaluate::evaluate,
    policy::{PolicySource, RegistryPolicy, StaticPolicy},
};

/// A container declared by a workload, reduced to the image it runs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ContainerRef {
    pub image: String,
}

// === impl ContainerRef ===

impl ContainerRef {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }
}
