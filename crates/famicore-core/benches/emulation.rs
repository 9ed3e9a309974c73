//! Whole-machine throughput benchmarks.

use criterion::{criterion_group, criterion_main, Criterion};
use famicore_core::Console;

/// Minimal NROM image: a counter loop with vectors pointing into it.
fn bench_rom() -> Vec<u8> {
    let mut prg = vec![0xEA; 16 * 1024];
    // INC $10 / JMP $8000
    prg[0x0000..0x0005].copy_from_slice(&[0xE6, 0x10, 0x4C, 0x00, 0x80]);
    for vector in [0x3FFA, 0x3FFC, 0x3FFE] {
        prg[vector..vector + 2].copy_from_slice(&0x8000u16.to_le_bytes());
    }

    let mut data = vec![0x4E, 0x45, 0x53, 0x1A, 1, 1, 0, 0];
    data.extend_from_slice(&[0; 8]);
    data.extend_from_slice(&prg);
    data.extend_from_slice(&[0; 8 * 1024]);
    data
}

fn bench_instruction_stepping(c: &mut Criterion) {
    let rom = bench_rom();
    c.bench_function("clock_10k_instructions", |b| {
        let mut console = Console::new(&rom).unwrap();
        b.iter(|| {
            for _ in 0..10_000 {
                console.clock();
            }
            console.cpu().cycles
        });
    });
}

fn bench_frame_rendering(c: &mut Criterion) {
    let rom = bench_rom();
    c.bench_function("step_frame", |b| {
        let mut console = Console::new(&rom).unwrap();
        // Rendering enabled makes this the worst case.
        while console.bus().cycles() < 29_700 {
            console.clock();
        }
        use famicore_cpu::Bus;
        console.bus_mut().write(0x2001, 0x1E);
        b.iter(|| console.step_frame());
    });
}

criterion_group!(benches, bench_instruction_stepping, bench_frame_rendering);
criterion_main!(benches);
