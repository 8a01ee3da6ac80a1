use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ring_buffer::RingBuffer;

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    sensor_id: u16,
    measurement_id: u8,
    value: f32,
    timestamp_ms: u32,
}

fn push_wrapping(c: &mut Criterion) {
    let mut ring: RingBuffer<Slot> = RingBuffer::new(3000).unwrap();
    let mut n = 0u32;
    c.bench_function("push_3000", |b| {
        b.iter(|| {
            n = n.wrapping_add(1);
            let percent = ring.push(Slot {
                sensor_id: 1,
                measurement_id: 5,
                value: n as f32,
                timestamp_ms: n,
            });
            if percent >= 90.0 {
                ring.reset_cursor();
            }
            black_box(percent)
        })
    });
}

fn read_last(c: &mut Criterion) {
    let mut ring: RingBuffer<Slot> = RingBuffer::new(3000).unwrap();
    for i in 0..2500 {
        ring.push(Slot {
            timestamp_ms: i,
            ..Default::default()
        });
    }
    c.bench_function("read_last_100", |b| b.iter(|| black_box(ring.read_last(100))));
}

criterion_group!(benches, push_wrapping, read_last);
criterion_main!(benches);
