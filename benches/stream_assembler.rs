use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use palaver::core::chat_stream::StreamAssembler;
use uuid::Uuid;

fn make_wire(n_lines: usize, delta: &str) -> Vec<u8> {
    let mut wire = Vec::new();
    for _ in 0..n_lines {
        wire.extend_from_slice(
            format!("data: {{\"choices\":[{{\"delta\":{{\"content\":\"{delta}\"}}}}]}}\n")
                .as_bytes(),
        );
    }
    wire.extend_from_slice(b"data: [DONE]\n");
    wire
}

fn consume(wire: &[u8], chunk_size: usize) {
    let mut assembler = StreamAssembler::new(Uuid::new_v4());
    for chunk in wire.chunks(chunk_size) {
        let _ = assembler.push(chunk);
    }
    let _ = assembler.finish();
}

fn bench_stream_assembler(c: &mut Criterion) {
    let delta = "lorem ipsum dolor sit amet consectetur adipiscing elit";

    for &lines in &[200usize, 2000usize] {
        let wire = make_wire(lines, delta);
        let mut group = c.benchmark_group("assemble");
        group.throughput(Throughput::Bytes(wire.len() as u64));

        // One chunk per event line vs transport-sized fragments.
        for &chunk_size in &[wire.len(), 1024usize, 17usize] {
            group.bench_with_input(
                BenchmarkId::new(format!("{lines}_lines"), chunk_size),
                &chunk_size,
                |b, &chunk_size| b.iter(|| consume(&wire, chunk_size)),
            );
        }
        group.finish();
    }
}

criterion_group!(benches, bench_stream_assembler);
criterion_main!(benches);
