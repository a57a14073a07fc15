pub mod compare;
pub mod matcher;
pub mod metadata;
pub mod remote_scan;
pub mod scanner;
pub mod size;

pub use compare::ComparisonOrchestrator;
pub use matcher::{match_folders, normalize_folder_name};
pub use metadata::FileMetadataReader;
pub use remote_scan::RemoteScanEngine;
pub use scanner::{sort_records, LocalScanner};
pub use size::{describe_size, format_size, SizeBreakdown};
