//! insar-stack - InSAR measurement stacks
//!
//! Virtual dataset addressing, bounded reads and network inversion over stacks of
//! interferograms, displacement time series and radar geometry.
//!
//! # Features
//!
//! - Epoch and pair indices derived from stored date strings
//! - Persistent keep/drop flags per interferogram
//! - Compound dataset names (`unwrapPhase-20161020_20161026`, `bperp-20161020`, `20161020`)
//!   resolved into bounded reads
//! - Design matrices and minimum-norm inversion of the interferogram network
//! - Streaming temporal and spatial reductions, one slice at a time
//! - In-memory and on-disk containers with Deflate, Zstd and RLE chunk compression
//!
//! # Containers
//!
//! Stacks are read through the [`Container`] trait. [`DirContainer`] stores attributes as
//! JSON and arrays as compressed chunks in a directory; [`MemoryContainer`] keeps
//! everything in memory. Implement `Container` to put a stack on other storage.
//!
//! # Example
//!
//! ```rust,ignore
//! use insar_stack::{AccessMode, BoundingBox, DirContainer, IfgramStack};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let container = DirContainer::open("/data/ifgramStack", AccessMode::Update)?;
//! let mut stack = IfgramStack::open(container)?;
//!
//! // Drop one interferogram and read the remaining unwrapped phase over a window
//! stack.set_keep(&["20161020_20161107"])?;
//! let phase = stack.read("unwrapPhase", Some(BoundingBox::new(0, 0, 100, 50)), true)?;
//!
//! // Invert the network of kept pairs
//! let bperp = stack.perp_baseline_time_series(true)?;
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod array;
pub mod catalog;
pub mod compression;
pub mod config;
pub mod drop_mask;
pub mod epoch;
pub mod error;
pub mod geometry;
pub mod ifgram;
pub mod io;
pub mod layout;
pub mod mask;
pub mod metadata;
pub mod network;
pub mod reduce;
pub mod stack;
pub mod store;
pub mod timeseries;
pub mod types;
pub mod utils;

// Re-exports
pub use address::{DatasetAddress, Qualifier, ReadPlan, Resolver, TemporalAxis};
pub use array::{ArrayData, Selection, TemporalSelector};
pub use catalog::{dataset_unit, AxisKind, DatasetSpec, StackKind, ValueScaling};
pub use compression::{CompressionLevel, CompressionMethod, Compressor};
pub use config::WriteOptions;
pub use drop_mask::DropMask;
pub use epoch::{Epoch, EpochIndex, EpochKey, Pair, PairIndex, PairKey};
pub use error::{Result, StackError};
pub use geometry::Geometry;
pub use ifgram::IfgramStack;
pub use io::{open_container, AccessMode, Attributes, Container, MemoryContainer, StorageBackend};
pub use layout::{ArrayInfo, ArrayLayout};
pub use mask::{read_mask, read_mask_file};
pub use metadata::StackMetadata;
pub use network::{design_matrices, invert_epoch_series, perp_baseline_time_series, DesignMatrices, Inversion};
pub use stack::{StackHandle, StackIndex, StackState};
pub use store::DirContainer;
pub use timeseries::TimeSeries;
pub use types::{AttrValue, BoundingBox, DataType};

/// Version of the insar-stack implementation
pub const INSAR_STACK_VERSION: &str = env!("CARGO_PKG_VERSION");
