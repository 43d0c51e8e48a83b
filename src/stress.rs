//! Multi-writer stress harness for the reclamation protocol.
//!
//! Writers repeatedly publish freshly allocated `Record`s and reclaim the one they
//! evicted; readers repeatedly protect the live record and check it was not
//! reclaimed under them. Every reclaimed record is poisoned before it is freed, so
//! a reader that validates an announcement too late sees `POISON` in its fields.
//!
//! All threads start together behind a gate that the coordinator opens once every
//! thread has been spawned.
//!
//! 回收协议的多写入者压力测试工具。
//! 写入者反复发布新分配的 `Record` 并回收被其驱逐的记录；读者反复保护存活记录，
//! 并检查它没有在读取期间被回收。每条被回收的记录在释放前都会被写入毒值，
//! 因此过晚验证声明的读者会在字段中看到 `POISON`。

use crate::error::{HazardError, Result};
use crate::state::AnnounceOrdering;
use crate::{HazardDomain, HazardReader};
use antidote::{Condvar, Mutex};
use log::{debug, error, info, warn};
use rand::Rng;
use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

/// Sentinel written into every field of a reclaimed record.
pub const POISON: u32 = 0xDEAD_BEEF;

/// Default number of reader threads.
pub const DEFAULT_READERS: usize = 1;

/// Default number of writer threads.
pub const DEFAULT_WRITERS: usize = 7;

/// Default number of iterations per thread.
pub const DEFAULT_ITERATIONS: usize = 10_000;

// Writer id of the current thread, or `UNTAGGED` outside writer threads.
const UNTAGGED: usize = usize::MAX;

thread_local! {
    static WRITER_ID: Cell<usize> = const { Cell::new(UNTAGGED) };
}

/// Allocation and ownership accounting shared by every `Record` of a run.
///
/// 一次运行中所有 `Record` 共享的分配与所有权统计。
#[derive(Debug, Default)]
pub struct Ledger {
    allocated: AtomicUsize,
    freed: AtomicUsize,
    poisoned_reads: AtomicUsize,
    misattributed_frees: AtomicUsize,
    double_evictions: AtomicUsize,
}

impl Ledger {
    /// Records created so far.
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }

    /// Records dropped so far.
    pub fn freed(&self) -> usize {
        self.freed.load(Ordering::Acquire)
    }

    /// Reads that observed a poisoned record.
    pub fn poisoned_reads(&self) -> usize {
        self.poisoned_reads.load(Ordering::Acquire)
    }

    /// Evicted records freed by a thread other than their evictor.
    pub fn misattributed_frees(&self) -> usize {
        self.misattributed_frees.load(Ordering::Acquire)
    }

    /// Records tagged as evicted more than once.
    pub fn double_evictions(&self) -> usize {
        self.double_evictions.load(Ordering::Acquire)
    }
}

/// The payload published by the stress harness: three small unsigned fields.
///
/// Fields are atomics accessed with relaxed ordering so that poisoning a record
/// a reader still holds (the bug the harness hunts for) is a detectable value
/// rather than a data race. Publication through the store provides the ordering.
///
/// Each record also carries the id of the writer that created it, the id of the
/// writer that evicted it, and the ledger it reports its drop to. When an evicted
/// record is dropped, the dropping thread must be its evictor.
///
/// 压力测试发布的负载：三个小的无符号字段。
/// 字段是以 relaxed 语义访问的原子变量，这样读者仍持有的记录被写入毒值
/// （即压力测试要捕捉的 bug）时是可检测的值而不是数据竞争。
/// 每条记录还携带创建它的写入者 id、驱逐它的写入者 id，以及它在 drop 时上报的账本。
#[derive(Debug)]
pub struct Record {
    fields: [AtomicU32; 3],
    creator: usize,
    evictor: AtomicUsize,
    ledger: Arc<Ledger>,
}

impl Record {
    fn with_creator(ledger: &Arc<Ledger>, creator: usize, values: [u32; 3]) -> Self {
        ledger.allocated.fetch_add(1, Ordering::Relaxed);
        Record {
            fields: values.map(AtomicU32::new),
            creator,
            evictor: AtomicUsize::new(UNTAGGED),
            ledger: ledger.clone(),
        }
    }

    /// A zero-initialized record, used as the first live value of a run.
    /// 零初始化的记录，作为一次运行的第一个存活值。
    pub fn zeroed(ledger: &Arc<Ledger>) -> Self {
        Self::with_creator(ledger, UNTAGGED, [0; 3])
    }

    /// A record with the given field values, created by writer `creator`.
    pub fn new(ledger: &Arc<Ledger>, creator: usize, values: [u32; 3]) -> Self {
        Self::with_creator(ledger, creator, values)
    }

    /// A record with every field drawn uniformly from `0..4`.
    pub fn random<R: Rng + ?Sized>(ledger: &Arc<Ledger>, creator: usize, rng: &mut R) -> Self {
        let values = [rng.gen_range(0..4), rng.gen_range(0..4), rng.gen_range(0..4)];
        Self::with_creator(ledger, creator, values)
    }

    /// Current field values.
    pub fn values(&self) -> [u32; 3] {
        [
            self.fields[0].load(Ordering::Relaxed),
            self.fields[1].load(Ordering::Relaxed),
            self.fields[2].load(Ordering::Relaxed),
        ]
    }

    /// Whether any field carries `POISON`.
    pub fn is_poisoned(&self) -> bool {
        self.values().contains(&POISON)
    }

    /// Overwrite every field with `POISON`.
    ///
    /// Requires exclusive ownership, i.e. the record has been reclaimed.
    pub fn poison(&mut self) {
        for field in &mut self.fields {
            *field.get_mut() = POISON;
        }
    }

    /// The writer that created this record, `None` for the initial record.
    pub fn creator(&self) -> Option<usize> {
        (self.creator != UNTAGGED).then_some(self.creator)
    }

    /// The writer that evicted this record, if any.
    pub fn evictor(&self) -> Option<usize> {
        let evictor = self.evictor.load(Ordering::Acquire);
        (evictor != UNTAGGED).then_some(evictor)
    }

    /// Tag this record as evicted by `writer`.
    ///
    /// Returns `false` (and counts a double eviction) if it was already tagged.
    pub fn tag_evictor(&self, writer: usize) -> bool {
        match self
            .evictor
            .compare_exchange(UNTAGGED, writer, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(previous) => {
                self.ledger.double_evictions.fetch_add(1, Ordering::Relaxed);
                warn!("record evicted by writer {writer} was already evicted by writer {previous}");
                false
            }
        }
    }
}

impl Drop for Record {
    fn drop(&mut self) {
        let evictor = *self.evictor.get_mut();
        if evictor != UNTAGGED {
            let freer = WRITER_ID.with(Cell::get);
            if freer != evictor {
                self.ledger.misattributed_frees.fetch_add(1, Ordering::Relaxed);
                error!("record evicted by writer {evictor} freed by writer {freer}");
            }
        }
        self.ledger.freed.fetch_add(1, Ordering::Release);
    }
}

/// What a writer does with a record once it is safe to reclaim.
///
/// 写入者在记录可以安全回收后如何处理它。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReclaimMode {
    /// Poison, then free immediately.
    #[default]
    Free,
    /// Poison, then keep the allocation alive until every reader has finished.
    ///
    /// An early reclamation then shows up as a poisoned read instead of a
    /// use-after-free.
    Quarantine,
}

/// Configuration of a stress run.
///
/// # Example
/// ```
/// use hazard_swap::stress::{self, StressConfig};
///
/// let config = StressConfig::new().readers(1).writers(2).iterations(100);
/// let report = stress::run(&config).unwrap();
/// assert!(report.is_clean());
/// ```
///
/// 压力测试运行的配置。
#[derive(Debug, Clone)]
pub struct StressConfig {
    readers: usize,
    writers: usize,
    iterations: usize,
    reclaim: ReclaimMode,
    ordering: AnnounceOrdering,
    abort_on_violation: bool,
    initial: [u32; 3],
}

impl StressConfig {
    /// Default: 1 reader, 7 writers, 10 000 iterations, `ReclaimMode::Free`,
    /// `AnnounceOrdering::Fenced`, no abort on violation.
    pub fn new() -> Self {
        Self {
            readers: DEFAULT_READERS,
            writers: DEFAULT_WRITERS,
            iterations: DEFAULT_ITERATIONS,
            reclaim: ReclaimMode::Free,
            ordering: AnnounceOrdering::Fenced,
            abort_on_violation: false,
            initial: [0; 3],
        }
    }

    /// Number of reader threads, each with its own hazard slot.
    pub fn readers(mut self, readers: usize) -> Self {
        self.readers = readers;
        self
    }

    /// Number of writer threads.
    pub fn writers(mut self, writers: usize) -> Self {
        self.writers = writers;
        self
    }

    /// Reads per reader and swaps per writer.
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// What writers do with a reclaimed record. See `ReclaimMode`.
    pub fn reclaim(mut self, reclaim: ReclaimMode) -> Self {
        self.reclaim = reclaim;
        self
    }

    /// Announcement ordering of the domain under test.
    pub fn announce_ordering(mut self, ordering: AnnounceOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Abort the process as soon as a reader observes a poisoned record.
    ///
    /// In `ReclaimMode::Free` a poisoned read means the record was freed under the
    /// reader, so nothing after it can be trusted. When unset, the reader thread
    /// panics instead and the violation is reported by `run`.
    pub fn abort_on_violation(mut self, abort: bool) -> Self {
        self.abort_on_violation = abort;
        self
    }

    /// Whether a poisoned read aborts the process.
    pub fn aborts_on_violation(&self) -> bool {
        self.abort_on_violation
    }

    /// Field values of the initial live record.
    #[cfg(test)]
    pub(crate) fn initial_values(mut self, values: [u32; 3]) -> Self {
        self.initial = values;
        self
    }

    /// Allocations a clean run performs: one per swap plus the initial record.
    pub fn expected_allocations(&self) -> usize {
        self.writers * self.iterations + 1
    }

    fn validate(&self) -> Result<()> {
        if self.readers == 0 && self.writers == 0 {
            return Err(HazardError::InvalidConfig(
                "a stress run needs at least one reader or writer",
            ));
        }
        Ok(())
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a stress run, taken after the domain has been torn down.
///
/// 压力测试运行的结果，在域被销毁之后统计。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StressReport {
    /// Validated reads across all readers.
    pub reads: usize,
    /// Swaps across all writers.
    pub swaps: usize,
    /// Reader threads that started.
    pub readers_spawned: usize,
    /// Writer threads that started.
    pub writers_spawned: usize,
    /// Threads that failed to spawn or panicked.
    pub failed_threads: usize,
    /// Records allocated, including the initial one.
    pub allocated: usize,
    /// Records dropped by the end of the run.
    pub freed: usize,
    /// Reads that observed `POISON`.
    pub poisoned_reads: usize,
    /// Evicted records freed by a thread other than their evictor.
    pub misattributed_frees: usize,
    /// Records tagged as evicted by more than one writer.
    pub double_evictions: usize,
}

impl StressReport {
    /// No thread failed, no invariant was violated, and every allocation was freed.
    pub fn is_clean(&self) -> bool {
        self.failed_threads == 0
            && self.poisoned_reads == 0
            && self.misattributed_frees == 0
            && self.double_evictions == 0
            && self.allocated == self.freed
    }
}

/// One-shot rendezvous: threads block in `wait` until `open` is called.
struct Gate {
    open: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    fn new() -> Self {
        Gate {
            open: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            open = self.cond.wait(open);
        }
    }

    fn open(&self) {
        *self.open.lock() = true;
        self.cond.notify_all();
    }
}

/// Reader loop: protect the live record `iterations` times and check it.
///
/// On a poisoned record, aborts the process if `abort_on_violation` is set and
/// panics otherwise. The guard and the reader clear the hazard slot on every exit
/// path, including that panic.
fn reader_loop(
    mut reader: HazardReader<Record>,
    iterations: usize,
    abort_on_violation: bool,
    start: &Gate,
    ledger: &Ledger,
) -> usize {
    let slot = reader.slot_index();
    start.wait();

    let mut reads = 0;
    for _ in 0..iterations {
        let record = reader.protect();
        if record.is_poisoned() {
            ledger.poisoned_reads.fetch_add(1, Ordering::Relaxed);
            error!(
                "reader on slot {slot} observed poisoned record {:?} (creator {:?})",
                record.values(),
                record.creator()
            );
            if abort_on_violation {
                std::process::abort();
            }
            panic!("reader on slot {slot} observed a reclaimed record");
        }
        reads += 1;
    }
    reads
}

/// Writer loop: publish `iterations` random records, reclaiming each evicted one.
fn writer_loop(
    id: usize,
    domain: HazardDomain<Record>,
    iterations: usize,
    reclaim: ReclaimMode,
    gates: &(Gate, Gate),
    ledger: &Arc<Ledger>,
) -> usize {
    let (start, readers_done) = gates;
    WRITER_ID.with(|writer| writer.set(id));
    let mut rng = rand::thread_rng();
    let mut quarantine = Vec::new();
    start.wait();

    for _ in 0..iterations {
        let retired = domain.swap(Record::random(ledger, id, &mut rng));
        retired.tag_evictor(id);

        let mut old = retired.reclaim();
        old.poison();
        match reclaim {
            ReclaimMode::Free => drop(old),
            ReclaimMode::Quarantine => quarantine.push(old),
        }
    }

    if !quarantine.is_empty() {
        readers_done.wait();
        debug!("writer {id} releasing {} quarantined records", quarantine.len());
    }
    iterations
}

fn join_all(kind: &str, handles: Vec<(usize, JoinHandle<usize>)>, report: &mut StressReport) -> usize {
    let mut total = 0;
    for (id, handle) in handles {
        match handle.join() {
            Ok(count) => total += count,
            Err(_) => {
                warn!("{kind} thread {id} panicked");
                report.failed_threads += 1;
            }
        }
    }
    total
}

/// Run the stress scenario described by `config`.
///
/// Lifecycle: build the domain around a zeroed initial record, register one
/// reader per reader thread, spawn writers then readers, open the start gate,
/// join readers then writers, and finally drop the domain, which frees the last
/// live record.
///
/// Spawn and join failures are logged and counted in the report rather than
/// aborting the run.
///
/// 运行 `config` 描述的压力测试场景。
pub fn run(config: &StressConfig) -> Result<StressReport> {
    config.validate()?;

    let ledger = Arc::new(Ledger::default());
    let domain = HazardDomain::builder()
        .reader_slots(config.readers.max(1))
        .announce_ordering(config.ordering)
        .build(Record::with_creator(&ledger, UNTAGGED, config.initial))?;

    let mut readers = Vec::with_capacity(config.readers);
    for _ in 0..config.readers {
        readers.push(domain.register_reader()?);
    }

    info!(
        "stress run: {} reader(s), {} writer(s), {} iterations, {:?}, {:?}",
        config.readers, config.writers, config.iterations, config.reclaim, config.ordering
    );

    let gates = Arc::new((Gate::new(), Gate::new()));
    let mut report = StressReport::default();

    let mut writer_handles = Vec::with_capacity(config.writers);
    for id in 0..config.writers {
        let domain = domain.clone();
        let gates = gates.clone();
        let ledger = ledger.clone();
        let (iterations, reclaim) = (config.iterations, config.reclaim);
        let spawned = thread::Builder::new()
            .name(format!("writer-{id}"))
            .spawn(move || writer_loop(id, domain, iterations, reclaim, &gates, &ledger));
        match spawned {
            Ok(handle) => writer_handles.push((id, handle)),
            Err(e) => {
                warn!("failed to spawn writer {id}: {e}");
                report.failed_threads += 1;
            }
        }
    }

    let mut reader_handles = Vec::with_capacity(config.readers);
    for (id, reader) in readers.into_iter().enumerate() {
        let gates = gates.clone();
        let ledger = ledger.clone();
        let (iterations, abort) = (config.iterations, config.abort_on_violation);
        let spawned = thread::Builder::new()
            .name(format!("reader-{id}"))
            .spawn(move || reader_loop(reader, iterations, abort, &gates.0, &ledger));
        match spawned {
            Ok(handle) => reader_handles.push((id, handle)),
            Err(e) => {
                warn!("failed to spawn reader {id}: {e}");
                report.failed_threads += 1;
            }
        }
    }

    report.writers_spawned = writer_handles.len();
    report.readers_spawned = reader_handles.len();

    gates.0.open();

    let reads = join_all("reader", reader_handles, &mut report);
    gates.1.open();
    let swaps = join_all("writer", writer_handles, &mut report);
    report.reads = reads;
    report.swaps = swaps;

    drop(domain);

    report.allocated = ledger.allocated();
    report.freed = ledger.freed();
    report.poisoned_reads = ledger.poisoned_reads();
    report.misattributed_frees = ledger.misattributed_frees();
    report.double_evictions = ledger.double_evictions();

    info!(
        "stress run finished: {} reads, {} swaps, {} allocated, {} freed",
        report.reads, report.swaps, report.allocated, report.freed
    );
    Ok(report)
}
