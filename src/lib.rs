pub mod core;
pub mod index;
pub mod search;
pub mod query;
pub mod mvcc;
pub mod writer;
pub mod reader;

/*
┌────────────────────────────────────────────────────────────────────────────────────────────┐
│                             SIEVEX STRUCT ARCHITECTURE                                       │
└────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── COLLECTION TIERS ───────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────────────────────────────────────────────────────────────────┐    │
│  │                         struct IndexedCollection<O>                                 │    │
│  │  ┌──────────────────────────────────────────────────────────────────────────────┐ │    │
│  │  │ store: ObjectStore<O>             // Canonical objects, ObjectId assignment   │ │    │
│  │  │ registry: IndexRegistry<O>        // Indexes by name and attribute            │ │    │
│  │  │ validator: QueryValidator         // Runs first in every retrieve             │ │    │
│  │  │ config: CollectionConfig                                                      │ │    │
│  │  │ mutation_count: u64               // Batches that changed something           │ │    │
│  │  └──────────────────────────────────────────────────────────────────────────────┘ │    │
│  └────────────────────────────────────────────────────────────────────────────────────┘    │
│                                                                                              │
│  ┌─────────────────────────────────────┐  ┌──────────────────────────────────────────┐    │
│  │ struct ConcurrentIndexedCollection  │  │ struct TransactionalIndexedCollection    │    │
│  │ • inner: RwLock<IndexedCollection>  │  │ • mvcc: MvccController<O>                │    │
│  │ • readers: ReaderPool               │  │                                          │    │
│  │   reader() -> CollectionReader      │  │   snapshot() -> Arc<Snapshot>            │    │
│  │   (blocking writers)                │  │   begin(level) -> Transaction            │    │
│  └─────────────────────────────────────┘  └──────────────────────────────────────────┘    │
│                                                                                              │
│  ┌──────────────────┐  ┌──────────────────┐  ┌───────────────────────────────────────┐    │
│  │ struct ObjectId  │  │ enum Value       │  │ struct CollectionStats                │    │
│  │ • 0: u32         │  │ • Boolean(bool)  │  │ • object_count                        │    │
│  └──────────────────┘  │ • Integer(i64)   │  │ • mutation_count                      │    │
│                        │ • Float(f64)     │  │ • indexes: Vec<IndexStats>            │    │
│  ┌──────────────────┐  │ • Text(String)   │  │ • version / active_readers            │    │
│  │ struct Error     │  │ • Date(DateTime) │  └───────────────────────────────────────┘    │
│  │ • kind: ErrorKind│  └──────────────────┘                                               │
│  │ • context: String│                                                                      │
│  └──────────────────┘                                                                      │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────────── QUERY LAYER ────────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────┐  ┌─────────────────────────┐  ┌──────────────────────────┐     │
│  │ enum Query<O>          │  │ enum Operator           │  │ struct QueryOptions<O>   │     │
│  │ • Predicate(Predicate) │  │ • Equal / In            │  │ • index_hint             │     │
│  │ • And(Vec<Query>)      │  │ • LessThan / GreaterThan│  │ • deduplication          │     │
│  │ • Or(Vec<Query>)       │  │ • Between / Has         │  │ • order_by               │     │
│  │ • Not(Box<Query>)      │  │ • StartsWith / EndsWith │  │ • context (opaque)       │     │
│  │ • All / None           │  │ • Contains / Matches    │  └──────────────────────────┘     │
│  └────────────────────────┘  └─────────────────────────┘                                    │
│                                                                                              │
│  ┌────────────────────────┐  ┌─────────────────────────┐  ┌──────────────────────────┐     │
│  │ struct Attribute<O>    │  │ struct QueryValidator   │  │ struct ObjectMatcher     │     │
│  │ • name, value_type     │  │ • depth / clause limits │  │ • brute-force semantics  │     │
│  │ • simple/nullable/multi│  │ • operand type checks   │  │   for scans and contains │     │
│  └────────────────────────┘  └─────────────────────────┘  └──────────────────────────┘     │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────────── INDEX LAYER ────────────────────────────────────────┐
│                                                                                              │
│  trait Index<O>: supports(kind) • estimate_cost(query) • retrieve(query) • notify_*         │
│                                                                                              │
│  ┌───────────────┐ ┌───────────────┐ ┌─────────────────┐ ┌──────────────────────┐          │
│  │ HashIndex     │ │ UniqueIndex   │ │ NavigableIndex  │ │ StandingQueryIndex   │          │
│  │ Value→Bitmap  │ │ Value→ObjectId│ │ BTreeMap<Value, │ │ Bitmap of objects    │          │
│  │ cost 30       │ │ cost 25       │ │  Bitmap> cost 40│ │ matching one query   │          │
│  └───────────────┘ └───────────────┘ └─────────────────┘ └──────────────────────┘          │
│                                                                                              │
│  struct IndexRegistry<O>: by_attribute → candidates, hints, lowest retrieval cost wins       │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────────── SEARCH LAYER ───────────────────────────────────────┐
│                                                                                              │
│  QueryEngine::retrieve(query, options)                                                       │
│      validate → resolve tree → Box<dyn ResultSource>  → ResultSet (lazy)                     │
│                                                                                              │
│  trait ResultSource: ids() • contains(id) • retrieval_cost • merge_cost • describe           │
│      BitmapSource  KeySetSource  ScanSource  AllSource  EmptySource                          │
│      Intersection(first drives, rest filter)  Union(optional dedup)  Difference              │
│                                                                                              │
│  struct PlanNode: explain() output, serializable                                             │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────────── MVCC LAYER ─────────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────────────────────────────────────────────────────────────────┐    │
│  │                           struct MvccController<O>                                  │    │
│  │  current: RwLock<Arc<Snapshot<O>>>   // Latest published version                    │    │
│  │  writer: Mutex<()>                   // Serializes copy-on-write batches            │    │
│  │  next_tx: AtomicU64                                                                 │    │
│  └────────────────────────────────────────────────────────────────────────────────────┘    │
│                                                                                              │
│  ┌────────────────────────┐  ┌─────────────────────────┐  ┌────────────────────┐          │
│  │ struct Snapshot<O>     │  │ enum IsolationLevel     │  │ struct Transaction │          │
│  │ • version: u64         │  │ • ReadCommitted         │  │ • id: TxId         │          │
│  │ • timestamp            │  │ • RepeatableRead        │  │ • to_add/to_remove │          │
│  │ • collection: Arc<>    │  │ • Serializable          │  │ • snapshot         │          │
│  └────────────────────────┘  └─────────────────────────┘  └────────────────────┘          │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── READER / WRITER ────────────────────────────────────────┐
│  struct ReaderPool: bounded read slots, waits reader_wait_ms, then ResourceExhausted        │
│  struct BatchWriter: buffers objects, flushes through add_all                               │
└──────────────────────────────────────────────────────────────────────────────────────────────┘
*/
