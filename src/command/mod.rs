use clap::Subcommand;

pub mod add_groups;
pub mod call;
pub mod catenate;
pub mod combine;
pub mod mapq_to_zero;
pub mod per_file;
pub mod reindex;
pub mod reorder;
pub mod threadcount;

pub use add_groups::{AddGroupsCMD, ReadGroup};
pub use call::{Call, CallCMD, MutectRunner};
pub use catenate::{Catenate, CatenateCMD};
pub use combine::{Combine, CombineCMD};
pub use mapq_to_zero::MapqToZeroCMD;
pub use reindex::ReindexCMD;
pub use reorder::ReorderCMD;
pub use threadcount::{determine_thread_count, determine_worker_count};

///////////////////////////////
/// Possible subcommands to parse
#[derive(Subcommand)]
pub enum Commands {
    /// Run MuTect per reference sequence over tumor/normal pairs
    Call(CallCMD),
    /// Join the per-sequence VCFs of each sample directory
    Catenate(CatenateCMD),
    /// Combine sample VCFs into one
    Combine(CombineCMD),
    /// Add read groups to every BAM in a directory
    AddGroups(AddGroupsCMD),
    /// Reorder every BAM under a directory to match a reference
    Reorder(ReorderCMD),
    /// Index every BAM under a directory
    Reindex(ReindexCMD),
    /// Set MAPQ 0 on unmapped reads of every BAM in a directory
    MapqToZero(MapqToZeroCMD),
}
