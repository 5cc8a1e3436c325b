pub mod descriptor;
pub mod executor;
pub mod rewriter;

pub use descriptor::{discover, find, BatchDescriptor, DirectiveSet, COMPILATION_BATCH};
pub use executor::BatchExecutor;
pub use rewriter::DescriptorRewriter;
