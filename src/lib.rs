pub mod bplus;
pub mod btree;
pub mod interval;
pub mod ordered;
pub mod store;
pub mod treap;
pub mod vacuum;

pub use bplus::{BPlusTree, BPlusTreeError, BPlusTreeResult};
pub use btree::{BTree, BTreeError, BTreeResult};
pub use interval::{Interval, IntervalError, IntervalResult, IntervalTree};
pub use ordered::OrderedIndex;
pub use store::{
    DEFAULT_CACHE_PAGES, PAGE_SIZE, Page, PageHeader, PageId, PageStore, PageView, RecordId,
    SlotId, StoreError, StoreResult,
};
pub use treap::{Treap, TreapError, TreapResult};
pub use vacuum::{
    AutoVacuumOptions, CancelSource, CancelToken, VacuumError, VacuumProgress, VacuumResult,
    VacuumService, VacuumSummary, Vacuumable, cancellation,
};
