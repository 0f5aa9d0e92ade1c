use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use std::sync::Arc;
use syswatch::{
    config::{CollectorConfig, ConfigVector},
    metrics::{
        reader::{self, CounterReader},
        DerivedValue, InMemoryProc, MetricKind, MetricStore, MetricsCollector,
    },
    web::handlers::render_prometheus,
};

const MEMINFO: &str = "\
MemTotal:       16314464 kB
MemFree:         1234567 kB
MemAvailable:    9876543 kB
Buffers:          456789 kB
Cached:          5678901 kB
";

const STAT: &str = "\
cpu  10132153 290696 3084719 46828483 16683 0 25195 0 175628 0
cpu0 1393280 32966 572056 13343292 6130 0 17875 0 23933 0
intr 1462898 0 9 0 0 0 0 0 0 1 0 0 0 0 0 0 0
ctxt 2334245
btime 1700000000
processes 123456
procs_running 2
procs_blocked 0
";

const DISKSTATS: &str = "\
   7       0 loop0 54 0 2212 15 0 0 0 0 0 40 15 0 0 0 0
   1       0 ram0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0
   8       0 sda 286054 81011 17066946 120391 530284 584513 38236048 856290 0 434636 1013006 0 0 0 0
   8       1 sda1 285800 81011 17054642 120351 530284 584513 38236048 856290 0 434600 976641 0 0 0 0
";

const NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 1234567     1234    0    0    0     0          0         0  1234567     1234    0    0    0     0       0          0
enp3s0: 9876543     5678    1    2    0     0          0        10 87654321     4321    3    4    0     0       0          0
";

fn fixture_proc() -> Arc<InMemoryProc> {
    let proc = Arc::new(InMemoryProc::new());
    proc.set(reader::MEMINFO, MEMINFO);
    proc.set(reader::STAT, STAT);
    proc.set(reader::DISKSTATS, DISKSTATS);
    proc.set(reader::NET_DEV, NET_DEV);
    proc
}

/// Benchmark the pseudo-file parsers
fn bench_parsers(c: &mut Criterion) {
    c.bench_function("parse_meminfo", |b| {
        b.iter(|| reader::parse_meminfo(black_box(MEMINFO)).unwrap())
    });
    c.bench_function("parse_cpu_times", |b| {
        b.iter(|| reader::parse_cpu_times(black_box(STAT)).unwrap())
    });
    c.bench_function("parse_disk_record", |b| {
        b.iter(|| reader::parse_disk_record(black_box(DISKSTATS)).unwrap())
    });
    c.bench_function("parse_net_record", |b| {
        b.iter(|| reader::parse_net_record(black_box(NET_DEV), Some("enp")).unwrap())
    });
}

/// Benchmark one full polling phase over in-memory pseudo-files
fn bench_poll_once(c: &mut Criterion) {
    let proc = fixture_proc();
    let mut collector = MetricsCollector::new(
        CounterReader::new(proc),
        ConfigVector::all(1).unwrap(),
        &CollectorConfig::default(),
        Arc::new(MetricStore::new()),
    );

    // static fixtures: cpu reports a zero interval, network kinds write zero deltas
    c.bench_function("poll_once_all_kinds", |b| {
        b.iter(|| collector.poll_once().unwrap())
    });
}

/// Benchmark store writes and scrapes under contention
fn bench_store(c: &mut Criterion) {
    let store = MetricStore::new();
    c.bench_function("store_write_gauge", |b| {
        b.iter(|| {
            store
                .write(MetricKind::CpuUsage, DerivedValue::Gauge(black_box(42.0)))
                .unwrap()
        })
    });
    c.bench_function("store_read_all", |b| b.iter(|| store.read_all().unwrap()));

    for writers in [1, 2, 4] {
        c.bench_with_input(
            BenchmarkId::new("contended_read_all", writers),
            &writers,
            |b, &writers| {
                let store = Arc::new(MetricStore::new());
                b.iter(|| {
                    let handles: Vec<_> = (0..writers)
                        .map(|_| {
                            let store = store.clone();
                            std::thread::spawn(move || {
                                for _ in 0..100 {
                                    store
                                        .write(MetricKind::NetSentPackets, DerivedValue::Counter(1))
                                        .unwrap();
                                }
                            })
                        })
                        .collect();
                    for _ in 0..100 {
                        black_box(store.read_all().unwrap());
                    }
                    for handle in handles {
                        handle.join().unwrap();
                    }
                })
            },
        );
    }
}

/// Benchmark Prometheus text exposition of a populated store
fn bench_exposition(c: &mut Criterion) {
    let store = MetricStore::new();
    for kind in MetricKind::ALL {
        let value = match kind.metric_type() {
            syswatch::MetricType::Gauge => DerivedValue::Gauge(kind.index() as f64 * 1.5),
            syswatch::MetricType::Counter => DerivedValue::Counter(1_000),
        };
        store.write(kind, value).unwrap();
    }
    let snapshot = store.read_all().unwrap();

    c.bench_function("render_prometheus", |b| {
        b.iter(|| render_prometheus(black_box(&snapshot)).unwrap())
    });
    c.bench_function("snapshot_json", |b| {
        b.iter(|| serde_json::to_string(black_box(&snapshot)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_parsers,
    bench_poll_once,
    bench_store,
    bench_exposition
);
criterion_main!(benches);
