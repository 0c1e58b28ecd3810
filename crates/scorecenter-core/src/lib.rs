// Data side of ScoreCenter: the sport/league/team tree, the remote data
// source that fills it, and the cache in front of that source.

pub mod grouping;
pub mod loader;
pub mod news;
pub mod source;

pub use grouping::{Grouping, GroupingKind, GroupingLevel, GroupingTree, NodeId, Player, RequestScope};
pub use loader::DataLoader;
pub use news::NewsItem;
pub use source::{DataError, RemoteDataSource};
