//! On-disk persistence of trained models and preprocessing state

mod store;

pub use store::{
    new_generation_id, ArtifactStore, BestModelPointer, Envelope, HeldOutSplit, StoredModel,
};
