// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

#[cfg(test)]
mod integration_tests {
    use crate::bus::{PeripheralRouter, SystemBus};
    use crate::cpu::{CoreHost, CoreRegister, Disassembly, ExecutionCore, CPU_STATE_SIZE};
    use crate::hooks::{Hooks, IllegalInstructionAction};
    use crate::interrupt::{InterruptAck, InterruptController};
    use crate::memory::MemoryRegion;
    use crate::peripherals::sim::PIT_CYCLES_PER_COUNT;
    use crate::signals::IplLine;
    use crate::{CpuModel, Mc68k, PeripheralBlock, SimulationError};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    const NOP: u16 = 0x4E71;
    const RTS: u16 = 0x4E75;
    const RESET: u16 = 0x4E70;
    const ILLEGAL: u16 = 0x4AFC;
    const BRA: u16 = 0x6000;
    const MOVE_W_IMM_ABS: u16 = 0x33FC;
    /// Not decodable at all: disassembles to a zero-length entry.
    const GARBAGE: u16 = 0xFFFF;

    const PROGRAM: u32 = 0x400;
    const STACK_TOP: u32 = 0x1000;

    /// Tiny 68k-flavoured interpreter: enough opcodes to drive the machine.
    #[derive(Debug, Default)]
    struct MockCore {
        pc: u32,
        sp: u32,
        sr: u32,
        cpu_type: u32,
        ipl: IplLine,
        acked: Vec<u8>,
        d0: u32,
    }

    impl MockCore {
        fn interrupt_mask(&self) -> u8 {
            ((self.sr >> 8) & 0x7) as u8
        }
    }

    impl ExecutionCore for MockCore {
        fn connect_irq(&mut self, line: IplLine) {
            self.ipl = line;
        }

        fn execute(&mut self, host: &mut dyn CoreHost) -> u32 {
            let level = self.ipl.level();
            if level != 0 && (level > self.interrupt_mask() || level == 7) {
                let vector = match host.interrupt_ack(level) {
                    InterruptAck::Vector(v) => v,
                    InterruptAck::Autovector => 24 + level,
                };
                self.acked.push(vector);
                self.sr = (self.sr & !0x0700) | ((level as u32) << 8);
                return 44;
            }

            let opcode = host.read_imm16(self.pc);
            match opcode {
                NOP => {
                    self.pc += 2;
                    4
                }
                RTS => {
                    self.pc = host.read32(self.sp);
                    self.sp += 4;
                    16
                }
                RESET => {
                    host.reset_instruction();
                    self.pc += 2;
                    132
                }
                MOVE_W_IMM_ABS => {
                    let value = host.read_imm16(self.pc + 2);
                    let addr = host.read32(self.pc + 4);
                    host.write16(addr, value);
                    self.pc += 8;
                    20
                }
                op if op & 0xFF00 == BRA => {
                    let disp = (op & 0xFF) as i8 as i32;
                    self.pc = (self.pc as i32 + 2 + disp) as u32;
                    10
                }
                op => {
                    self.d0 = host.illegal_instruction(op as u32);
                    self.pc += 2;
                    34
                }
            }
        }

        fn pulse_reset(&mut self, host: &mut dyn CoreHost) {
            self.sp = host.read32(0);
            self.pc = host.read32(4);
            self.sr = 0x2700;
        }

        fn reg(&self, reg: CoreRegister) -> u32 {
            match reg {
                CoreRegister::Pc => self.pc,
                CoreRegister::Sp => self.sp,
                CoreRegister::Sr => self.sr,
                CoreRegister::CpuType => self.cpu_type,
            }
        }

        fn set_reg(&mut self, reg: CoreRegister, value: u32) {
            match reg {
                CoreRegister::Pc => self.pc = value,
                CoreRegister::Sp => self.sp = value,
                CoreRegister::Sr => self.sr = value,
                CoreRegister::CpuType => self.cpu_type = value,
            }
        }

        fn disassemble(&self, host: &mut dyn CoreHost, pc: u32) -> Disassembly {
            let opcode = host.read16(pc);
            let (text, length) = match opcode {
                NOP => ("nop".to_string(), 2),
                RTS => ("rts".to_string(), 2),
                RESET => ("reset".to_string(), 2),
                ILLEGAL => ("illegal".to_string(), 2),
                MOVE_W_IMM_ABS => (
                    format!(
                        "move.w #${:x}, ${:x}",
                        host.read16(pc + 2),
                        host.read32(pc + 4)
                    ),
                    8,
                ),
                GARBAGE => ("???".to_string(), 0),
                op if op & 0xFF00 == BRA => {
                    let target = (pc as i32 + 2 + (op & 0xFF) as i8 as i32) as u32;
                    (format!("bra ${:x}", target), 2)
                }
                op => (format!("dc.w ${:04x}", op), 2),
            };
            Disassembly { text, length }
        }
    }

    fn load_words(mcu: &mut Mc68k<MockCore>, addr: u32, words: &[u16]) {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        assert!(mcu.bus_mut().load(addr, &bytes));
    }

    /// RAM at zero with a vector table pointing at `PROGRAM`.
    fn create_machine(program: &[u16]) -> Mc68k<MockCore> {
        let mut mcu = Mc68k::new(MockCore::default());
        mcu.bus_mut()
            .add_region(MemoryRegion::new("ram", 0, 0x1000, false));
        mcu.bus_mut().write32(0, STACK_TOP);
        mcu.bus_mut().write32(4, PROGRAM);
        load_words(&mut mcu, PROGRAM, program);
        mcu.reset();
        mcu
    }

    #[test]
    fn test_state_budget_holds_for_mock_core() {
        assert!(<MockCore as ExecutionCore>::STATE_SIZE <= CPU_STATE_SIZE);
    }

    #[test]
    fn test_new_machine_selects_default_cpu_model() {
        let mcu = Mc68k::new(MockCore::default());
        assert_eq!(mcu.core().cpu_type, CpuModel::M68020.code());
        assert_eq!(mcu.cpu_model(), Some(CpuModel::M68020));
        assert_eq!(mcu.cycles(), 0);
        assert_eq!(mcu.ipl(), 0);
    }

    #[test]
    fn test_reset_loads_vector_table() {
        let mcu = create_machine(&[NOP]);
        assert_eq!(mcu.pc(), PROGRAM);
        assert_eq!(mcu.core().sp, STACK_TOP);
    }

    #[test]
    fn test_exec_advances_every_block_by_same_delta() {
        let mut mcu = create_machine(&[NOP, NOP, MOVE_W_IMM_ABS, 0x0000, 0x00FF, 0xFA22, NOP]);

        assert_eq!(mcu.exec().unwrap(), 4);
        assert_eq!(mcu.exec().unwrap(), 4);
        assert_eq!(mcu.exec().unwrap(), 20);
        assert_eq!(mcu.exec().unwrap(), 4);

        assert_eq!(mcu.cycles(), 32);
        assert_eq!(mcu.gpt().total_cycles(), 32);
        assert_eq!(mcu.sim().total_cycles(), 32);
        assert_eq!(mcu.qsm().total_cycles(), 32);
    }

    #[test]
    fn test_run_returns_consumed_cycles() {
        let mut mcu = create_machine(&[NOP, NOP, NOP, BRA | 0xF8]);
        // Three NOPs and a branch back to the start, twice.
        assert_eq!(mcu.run(8).unwrap(), 2 * (3 * 4 + 10));
        assert_eq!(mcu.pc(), PROGRAM);
    }

    #[test]
    fn test_core_writes_reach_peripherals_through_mask() {
        // move.w #$0640, $AAFFFA22 -> PICR
        let mut mcu = create_machine(&[MOVE_W_IMM_ABS, 0x0640, 0xAAFF, 0xFA22]);
        mcu.exec().unwrap();
        assert_eq!(mcu.bus_mut().read16(0x00FF_FA22), 0x0640);
    }

    #[test]
    fn test_interrupt_acknowledged_by_core() {
        let mut mcu = create_machine(&[NOP, NOP, NOP, NOP]);
        mcu.core_mut().sr = 0x2000;

        mcu.inject_interrupt(0x40, 5);
        mcu.inject_interrupt(0x41, 3);
        assert_eq!(mcu.core().ipl.level(), 5);

        assert_eq!(mcu.exec().unwrap(), 44);
        assert_eq!(mcu.core().acked, vec![0x40]);
        assert_eq!(mcu.ipl(), 3);

        // Level 3 is masked while servicing level 5.
        mcu.exec().unwrap();
        assert_eq!(mcu.core().acked, vec![0x40]);
        assert!(mcu.has_pending_interrupt(0x41, 3));

        mcu.core_mut().sr = 0x2000;
        mcu.exec().unwrap();
        assert_eq!(mcu.core().acked, vec![0x40, 0x41]);
        assert_eq!(mcu.ipl(), 0);
        assert!(!mcu.has_pending_interrupt(0x41, 3));
    }

    #[test]
    fn test_pit_interrupt_raised_by_advance_is_taken_next_step() {
        let mut words = vec![
            // PICR: level 6, vector 0x40
            MOVE_W_IMM_ABS,
            0x0640,
            0x00FF,
            0xFA22,
            // PITR: modulus 1
            MOVE_W_IMM_ABS,
            0x0001,
            0x00FF,
            0xFA24,
        ];
        words.extend(std::iter::repeat(NOP).take(600));
        let mut mcu = create_machine(&words);
        mcu.core_mut().sr = 0x2000;

        mcu.run(2).unwrap();
        let mut steps = 0;
        while mcu.core().acked.is_empty() && steps < 1000 {
            mcu.exec().unwrap();
            steps += 1;
        }

        assert_eq!(mcu.core().acked, vec![0x40]);
        assert!(mcu.cycles() >= PIT_CYCLES_PER_COUNT as u64);
        assert_eq!(mcu.sim().pit_expirations(), 1);
    }

    #[test]
    fn test_spurious_ack_yields_autovector() {
        let mut mcu = create_machine(&[NOP]);
        mcu.core_mut().sr = 0x2000;
        // Pin driven without anything queued behind it.
        mcu.interrupts().line().set(4);
        mcu.exec().unwrap();
        assert_eq!(mcu.core().acked, vec![24 + 4]);
    }

    #[test]
    fn test_illegal_instruction_halts_by_default() {
        let mut mcu = create_machine(&[ILLEGAL, NOP]);
        let err = mcu.exec().unwrap_err();
        match err {
            SimulationError::IllegalInstruction { opcode, pc } => {
                assert_eq!(opcode, ILLEGAL as u32);
                assert_eq!(pc, PROGRAM);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Cycles of the faulting instruction are still accounted.
        assert_eq!(mcu.cycles(), 34);
        assert_eq!(mcu.gpt().total_cycles(), 34);

        // run() stops at the first fault.
        let mut mcu = create_machine(&[NOP, ILLEGAL, NOP]);
        assert!(matches!(
            mcu.run(10),
            Err(SimulationError::IllegalInstruction { pc, .. }) if pc == PROGRAM + 2
        ));
        assert_eq!(mcu.cycles(), 4 + 34);
    }

    #[test]
    fn test_illegal_instruction_hook_resumes() {
        let mut mcu = create_machine(&[ILLEGAL, NOP]);
        mcu.set_hooks(
            Hooks::new().with_on_illegal_instruction(|op| IllegalInstructionAction::Resume(op ^ 1)),
        );
        assert_eq!(mcu.exec().unwrap(), 34);
        assert_eq!(mcu.core().d0, (ILLEGAL ^ 1) as u32);
        assert_eq!(mcu.exec().unwrap(), 4);
    }

    #[test]
    fn test_reset_instruction_calls_hook() {
        let resets = Arc::new(AtomicU32::new(0));
        let seen = resets.clone();
        let mut mcu = create_machine(&[RESET, RESET, NOP]);
        mcu.set_hooks(Hooks::new().with_on_reset(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        mcu.run(3).unwrap();
        assert_eq!(resets.load(Ordering::SeqCst), 2);
        assert_eq!(mcu.cycles(), 132 * 2 + 4);
    }

    #[test]
    fn test_reset_vector_from_manifest_overrides_table() {
        let manifest = mc68k_config::SystemManifest::from_yaml_str(
            r#"
name: "board"
cpu: mc68331
memory:
  - id: ram
    base: 0x0
    size: "4KiB"
reset:
  pc: 0x800
  sp: 0xF00
"#,
        )
        .unwrap();
        let mut mcu = Mc68k::from_config(MockCore::default(), &manifest).unwrap();
        assert_eq!(mcu.cpu_model(), Some(CpuModel::Cpu32));

        mcu.reset();
        assert_eq!(mcu.pc(), 0x800);
        assert_eq!(mcu.core().sp, 0xF00);
    }

    #[test]
    fn test_dump_assembly_splits_basic_blocks() {
        let mut mcu = create_machine(&[
            NOP,
            RTS,
            MOVE_W_IMM_ABS,
            0x1234,
            0x00FF,
            0xF904,
            BRA | 0xFC,
            GARBAGE,
            NOP,
        ]);
        // The zero-length entry at 0x40e advances a single byte.
        let path = std::env::temp_dir().join(format!("mc68k-dump-{}.s", std::process::id()));

        mcu.dump_assembly(&path, PROGRAM, 16, true).unwrap();
        let listing = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let expected = "\
000400: nop
000402: rts

000404: move.w #$1234, $fff904
00040c: bra $40a

00040e: ???
00040f: dc.w $ff4e
";
        assert_eq!(listing, expected);
    }

    #[test]
    fn test_dump_assembly_without_split() {
        let mut mcu = create_machine(&[NOP, RTS, NOP]);
        let path = std::env::temp_dir().join(format!("mc68k-flat-{}.s", std::process::id()));

        mcu.dump_assembly(&path, PROGRAM, 6, false).unwrap();
        let listing = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(listing.lines().count(), 3);
        assert!(!listing.contains("\n\n"));
    }

    #[test]
    fn test_dump_assembly_reports_unwritable_path() {
        let mut mcu = create_machine(&[NOP]);
        let path = std::env::temp_dir()
            .join("mc68k-no-such-dir")
            .join("out.s");
        let err = mcu.dump_assembly(&path, PROGRAM, 2, false).unwrap_err();
        assert!(matches!(err, SimulationError::Dump { .. }));
    }

    type AdvanceLog = Arc<Mutex<Vec<(&'static str, u32)>>>;

    #[derive(Debug)]
    struct RecordingBlock {
        name: &'static str,
        base: u32,
        size: u32,
        writes: Vec<(u32, u8)>,
        advance_log: AdvanceLog,
    }

    impl RecordingBlock {
        fn new(name: &'static str, base: u32, size: u32, log: &AdvanceLog) -> Self {
            Self {
                name,
                base,
                size,
                writes: Vec::new(),
                advance_log: log.clone(),
            }
        }
    }

    impl PeripheralBlock for RecordingBlock {
        fn name(&self) -> &'static str {
            self.name
        }

        fn is_in_range(&self, addr: u32) -> bool {
            addr >= self.base && addr < self.base + self.size
        }

        fn read8(&mut self, _addr: u32) -> u8 {
            self.name.as_bytes()[0]
        }

        fn write8(&mut self, addr: u32, value: u8) {
            self.writes.push((addr, value));
        }

        fn advance(&mut self, cycles: u32, _irq: &mut InterruptController) {
            self.advance_log.lock().unwrap().push((self.name, cycles));
        }
    }

    #[test]
    fn test_overlapping_blocks_first_claimant_wins() {
        let log = AdvanceLog::default();
        let router = PeripheralRouter::with_blocks(
            0x00FF_FFFF,
            RecordingBlock::new("timer", 0x1000, 0x100, &log),
            RecordingBlock::new("sim", 0x1080, 0x100, &log),
            RecordingBlock::new("qsm", 0x1000, 0x400, &log),
        );
        let mut bus = SystemBus::with_router(router);

        assert_eq!(bus.read8(0x1090), b't');
        assert_eq!(bus.read8(0x1100), b's');
        assert_eq!(bus.read8(0x1300), b'q');
        assert_eq!(bus.describe(0x1300), Some("qsm"));
        assert_eq!(bus.read8(0x2000), 0);

        bus.write8(0xFF00_1090, 0x5A);
        assert_eq!(bus.peripherals.timer.writes, vec![(0x1090, 0x5A)]);
        assert!(bus.peripherals.system.writes.is_empty());

        let mut irq = InterruptController::new();
        bus.peripherals.advance(8, &mut irq);
        assert_eq!(
            *log.lock().unwrap(),
            vec![("timer", 8), ("sim", 8), ("qsm", 8)]
        );
    }

    #[test]
    fn test_each_block_advanced_once_per_exec_with_its_delta() {
        let log = AdvanceLog::default();
        let router = PeripheralRouter::with_blocks(
            0x00FF_FFFF,
            RecordingBlock::new("timer", 0xFF_F900, 0x40, &log),
            RecordingBlock::new("system", 0xFF_FA00, 0x80, &log),
            RecordingBlock::new("serial", 0xFF_FC00, 0x200, &log),
        );
        let mut bus = SystemBus::with_router(router);
        bus.add_region(MemoryRegion::new("ram", 0, 0x1000, false));
        for (i, word) in [NOP, MOVE_W_IMM_ABS, 0xBEEF, 0x00FF, 0xF900, NOP]
            .into_iter()
            .enumerate()
        {
            bus.write16(PROGRAM + 2 * i as u32, word);
        }

        let mut mcu = Mc68k::with_bus(MockCore::default(), bus, CpuModel::Cpu32);
        mcu.set_pc(PROGRAM);

        assert_eq!(mcu.exec().unwrap(), 4);
        assert_eq!(mcu.exec().unwrap(), 20);
        mcu.inject_interrupt(0x40, 3);
        assert_eq!(mcu.exec().unwrap(), 44);

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                ("timer", 4),
                ("system", 4),
                ("serial", 4),
                ("timer", 20),
                ("system", 20),
                ("serial", 20),
                ("timer", 44),
                ("system", 44),
                ("serial", 44),
            ]
        );
        assert_eq!(mcu.cycles(), 4 + 20 + 44);
        assert_eq!(
            mcu.bus().peripherals.timer.writes,
            vec![(0xFF_F900, 0xBE), (0xFF_F901, 0xEF)]
        );
        assert_eq!(mcu.core().acked, vec![0x40]);
        assert_eq!(mcu.core().cpu_type, 9);
    }

    #[test]
    fn test_peek_peripheral_snapshots() {
        let mut mcu = create_machine(&[NOP]);
        mcu.port_e().set_pins(0x3C);
        let sim = mcu.peek_peripheral("sim").unwrap();
        assert_eq!(sim["port_e"]["pins"], 0x3C);
        assert!(mcu.peek_peripheral("qsm").is_some());
        assert!(mcu.peek_peripheral("nvic").is_none());
    }
}
