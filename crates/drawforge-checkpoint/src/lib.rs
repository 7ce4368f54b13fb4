//! Durable checkpoints for evolution state and trained models.
//!
//! # Layers
//!
//! ```text
//! ModelCheckpointManager   model + optimizer state + metadata per checkpoint folder
//!     ↓ uses
//! Model / Optimizer        capability traits (LogisticModel is the built-in model)
//!     ↓ encodes with
//! tensor                   little-endian f32 weight blobs + weight specs
//!     ↓ stored by
//! CheckpointStore          keyed JSON / binary files under one root directory
//! ```
//!
//! # Directory Layout
//!
//! ```text
//! <root>/
//! ├── population/latest.json
//! └── <checkpoint>/
//!     ├── model/model.json
//!     ├── model/weights.bin
//!     ├── optimizer_state.bin
//!     └── metadata.json
//! ```
//!
//! Reading a key that was never written yields `None`, never an error. Only I/O
//! failures on existing files and malformed contents are errors.

pub use self::{manager::*, metadata::*, store::*};

pub mod logistic;
mod manager;
mod metadata;
pub mod model;
mod store;
pub mod tensor;
