//! The S3FIFO DRAM tier (spec §4.1).

mod s3fifo;

pub use s3fifo::S3Fifo;
