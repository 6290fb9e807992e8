use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use ze::buffer::Buffer;

fn buffer_insertion(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_insertion");

    // Sequential typing extends a single add piece
    group.bench_function("typing_append", |b| {
        b.iter_batched(
            Buffer::new,
            |mut buf| {
                for i in 0..100 {
                    buf.insert(i, black_box(b"a"));
                }
            },
            criterion::BatchSize::SmallInput,
        )
    });

    static TEXT: &str = "The quick brown fox jumps over the lazy dog. ";
    group.throughput(Throughput::Bytes(TEXT.len() as u64));
    group.bench_function("insert_str_small", |b| {
        b.iter_batched(
            Buffer::new,
            |mut buf| {
                buf.insert(0, black_box(TEXT.as_bytes()));
            },
            criterion::BatchSize::SmallInput,
        )
    });

    // Scattered inserts split pieces
    group.bench_function("insert_scattered", |b| {
        b.iter_batched(
            || Buffer::from_bytes(vec![b'x'; 64 * 1024]),
            |mut buf| {
                for i in 0..100 {
                    buf.insert(black_box(i * 293), b"yy");
                }
            },
            criterion::BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn buffer_line_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_line_lookup");

    let text: String = (0..10_000).map(|i| format!("line number {}\n", i)).collect();
    let fragmented = {
        // Front inserts defeat the append fast path, one piece per chunk
        let mut buf = Buffer::new();
        let bytes = text.as_bytes();
        for chunk in bytes.chunks(57).rev() {
            buf.insert(0, chunk);
        }
        buf
    };
    let whole = Buffer::from_bytes(text.into_bytes());

    group.bench_function("line_start_whole", |b| {
        b.iter(|| {
            for line in (0..10_000).step_by(97) {
                black_box(whole.get_line_start(black_box(line)));
            }
        })
    });

    group.bench_function("line_start_fragmented", |b| {
        b.iter(|| {
            for line in (0..10_000).step_by(97) {
                black_box(fragmented.get_line_start(black_box(line)));
            }
        })
    });

    group.bench_function("find_line_by_pos", |b| {
        let len = whole.len();
        b.iter(|| {
            for pos in (0..len).step_by(1373) {
                black_box(whole.find_line_by_pos(black_box(pos)));
            }
        })
    });

    group.finish();
}

fn buffer_deletion(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_deletion");

    group.bench_function("delete_backward_run", |b| {
        b.iter_batched(
            || Buffer::from_bytes(vec![b'x'; 4096]),
            |mut buf| {
                for _ in 0..100 {
                    let len = buf.len();
                    buf.delete(len - 1, 1);
                }
            },
            criterion::BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, buffer_insertion, buffer_line_lookup, buffer_deletion);
criterion_main!(benches);
