pub mod bam;
pub mod manifest;

pub use bam::read_reference_names;
pub use bam::BamHeaderSegments;

pub use manifest::pairs_from_args;
pub use manifest::PairListReader;
