//! The full MMC3 IRQ chain: PPU scanline counting through the mapper into
//! the CPU's level-sensitive IRQ input.

mod common;

use common::build_ines;
use famicore_core::Console;
use famicore_cpu::Bus;

/// 32 KiB MMC3 image. The program clears I and spins; the IRQ handler
/// acknowledges the mapper and bumps a RAM counter.
fn mmc3_rom() -> Vec<u8> {
    let mut prg = vec![0xEA; 32 * 1024];
    // 0x8000 (bank 0): CLI / JMP $8001
    prg[0x0000] = 0x58;
    prg[0x0001..0x0004].copy_from_slice(&[0x4C, 0x01, 0x80]);
    // 0x8500: LDA #0 / STA $E000 (ack + disable) / INC $10 / RTI
    prg[0x0500..0x0508].copy_from_slice(&[0xA9, 0x00, 0x8D, 0x00, 0xE0, 0xE6, 0x10, 0x40]);
    // Vectors live in the fixed last bank.
    prg[0x7FFC..0x7FFE].copy_from_slice(&0x8000u16.to_le_bytes());
    prg[0x7FFE..0x8000].copy_from_slice(&0x8500u16.to_le_bytes());
    prg[0x7FFA..0x7FFC].copy_from_slice(&0x8500u16.to_le_bytes());
    build_ines(4, true, &prg, &vec![0; 8 * 1024])
}

#[test]
fn scanline_counter_interrupts_the_cpu() {
    let mut console = Console::new(&mmc3_rom()).unwrap();

    // Past the PPU warm-up so the mask write lands.
    while console.bus().cycles() < 29_700 {
        console.clock();
    }

    // Program the IRQ unit: latch 3, reload, enable; then turn on
    // background rendering so the PPU clocks the counter each line.
    let bus = console.bus_mut();
    bus.write(0xC000, 3);
    bus.write(0xC001, 0);
    bus.write(0xE001, 0);
    bus.write(0x2001, 0x08);

    console.step_frame();
    console.step_frame();
    // Handler ran exactly once: it disabled the IRQ on acknowledge.
    assert_eq!(console.bus().peek(0x0010), 1);
    assert!(!console.bus().mapper.irq_pending());
}

#[test]
fn irq_stays_masked_while_i_is_set() {
    let mut console = Console::new(&mmc3_rom()).unwrap();
    // Overwrite the CLI with a NOP by pointing PC past it.
    console.cpu_mut().pc = 0x8001;

    while console.bus().cycles() < 29_700 {
        console.clock();
    }
    let bus = console.bus_mut();
    bus.write(0xC000, 3);
    bus.write(0xC001, 0);
    bus.write(0xE001, 0);
    bus.write(0x2001, 0x08);

    console.step_frame();
    console.step_frame();
    // The line is asserted but the CPU never took it.
    assert!(console.bus().mapper.irq_pending());
    assert_eq!(console.bus().peek(0x0010), 0);
}
