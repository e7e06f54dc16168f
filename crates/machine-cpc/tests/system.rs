//! Whole-machine tests: programs run through `Cpc` with the gate array,
//! raster timer, DMA channel and slot peripherals all live.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use emu_core::{Observable, Value};
use machine_cpc::{
    ChipSelect, ConfigError, Cpc, CpcConfig, CpcModel, MapEntry, Peripheral, ROM_SIZE,
    RasterConfig, RomSet, Target,
};

fn make_cpc(config: &CpcConfig, program: &[u8]) -> Cpc {
    let mut cpc = Cpc::new(config, RomSet::default()).expect("valid config");
    cpc.load(0, program);
    cpc
}

#[test]
fn load_add_jump_halt() {
    let program = [
        0x3E, 0x05, //       LD A,5
        0x06, 0x03, //       LD B,3
        0x80, //       loop: ADD A,B
        0x10, 0xFD, //       DJNZ loop
        0xFE, 0x0B, //       CP 11
        0x20, 0xFE, //       JR NZ,$
        0x76, //             HALT
    ];
    let mut cpc = make_cpc(&CpcConfig::default(), &program);
    let summary = cpc.run_until_halt(10_000).expect("halts");

    assert_eq!(cpc.cpu().a(), 11);
    assert_eq!(cpc.cpu().registers().b, 0);
    // Z and N from the compare, X from the operand.
    assert_eq!(cpc.cpu().f(), 0x4A);
    assert_eq!(summary.pc, 0x000C);
    // 7 + 7 + 3 x 4 + (13 + 13 + 8) + 7 + 7 + 4
    assert_eq!(summary.tstates, 78);
    assert_eq!(summary.master_ticks, 78 * 4);
    assert_eq!(cpc.query("cpu.halted"), Some(Value::Bool(true)));
}

#[test]
fn wait_stretch_rounds_cycles_to_four() {
    let program = [
        0x00, //       NOP
        0x3E, 0xFB, // LD A,$FB
        0x23, //       INC HL
        0xD3, 0x00, // OUT ($00),A
        0x76, //       HALT
    ];
    let mut plain = make_cpc(&CpcConfig::default(), &program);
    assert_eq!(plain.run_until_halt(1_000).expect("halts").tstates, 4 + 7 + 6 + 11 + 4);

    let config = CpcConfig {
        wait_stretch: true,
        ..CpcConfig::default()
    };
    let mut stretched = make_cpc(&config, &program);
    // 4 + 8 + 8 + 12 + 4: INC HL's 6 T-states become 8 through the wait on
    // the next opcode fetch.
    assert_eq!(stretched.run_until_halt(1_000).expect("halts").tstates, 36);
    assert_eq!(stretched.cpu().a(), 0xFB);
}

const INTERRUPT_COUNTER: [u8; 6] = [
    0xED, 0x56, //       IM 1
    0xFB, //             EI
    0x76, //       wait: HALT
    0x18, 0xFD, //       JR wait
];

const IM1_HANDLER: [u8; 3] = [
    0x04, //             INC B
    0xFB, //             EI
    0xC9, //             RET
];

fn make_interrupt_counter(config: &CpcConfig) -> Cpc {
    let mut cpc = make_cpc(config, &INTERRUPT_COUNTER);
    cpc.load(0x0038, &IM1_HANDLER);
    cpc.cpu_mut().set_sp(0xC000);
    cpc.cpu_mut().registers_mut().b = 0;
    cpc
}

#[test]
fn gate_array_interrupts_every_52_lines() {
    let mut cpc = make_interrupt_counter(&CpcConfig::default());

    // Lines 52, 104, 156, 208 and 260 are serviced. The one raised on the
    // last line of the frame is still pending.
    assert_eq!(cpc.run_frame(), 79_872);
    assert_eq!(cpc.cpu().registers().b, 5);
    assert_eq!(cpc.query("gate_array.int"), Some(Value::Bool(true)));

    // VSYNC restarts the count two lines into the frame, so only five more
    // are raised before the next VSYNC.
    cpc.run_frame();
    assert_eq!(cpc.cpu().registers().b, 11);
    assert_eq!(cpc.query("gate_array.int"), Some(Value::Bool(false)));
    assert_eq!(cpc.query("gate_array.counter"), Some(Value::U8(50)));

    // Counter at 52 when the VSYNC reset lands: interrupt there, then every
    // 52 lines again.
    cpc.run_frame();
    assert_eq!(cpc.cpu().registers().b, 17);
    assert_eq!(cpc.frame_count(), 3);
}

#[test]
fn interrupts_wait_for_ei() {
    let mut cpc = make_interrupt_counter(&CpcConfig::default());
    cpc.load(0x0002, &[0x00]); // EI becomes NOP
    cpc.run_frame();
    assert_eq!(cpc.cpu().registers().b, 0);
    assert_eq!(cpc.query("cpu.iff1"), Some(Value::Bool(false)));
    // Nothing acknowledges it, so the request stays up.
    assert_eq!(cpc.query("gate_array.int"), Some(Value::Bool(true)));
}

#[test]
fn same_inputs_same_machine() {
    let config = CpcConfig {
        wait_stretch: true,
        ..CpcConfig::default()
    };
    let run = || {
        let mut cpc = make_interrupt_counter(&config);
        for _ in 0..3 {
            cpc.run_frame();
        }
        (cpc.cpu().snapshot(), cpc.bus().gate_array.snapshot(), cpc.master_clock())
    };
    assert_eq!(run(), run());
}

#[test]
fn ram_banking_through_the_gate_array() {
    let program = [
        0x01, 0x00, 0x7F, // LD BC,$7F00
        0x3E, 0xC4, //       LD A,$C4      RAM configuration 4
        0xED, 0x79, //       OUT (C),A
        0x3E, 0x55, //       LD A,$55
        0x32, 0x00, 0x40, // LD ($4000),A
        0x3E, 0xC0, //       LD A,$C0      RAM configuration 0
        0xED, 0x79, //       OUT (C),A
        0x3A, 0x00, 0x40, // LD A,($4000)
        0x76, //             HALT
    ];
    let config = CpcConfig {
        model: CpcModel::Cpc6128,
        ..CpcConfig::default()
    };
    let mut cpc = make_cpc(&config, &program);
    cpc.run_until_halt(1_000).expect("halts");

    assert_eq!(cpc.cpu().a(), 0x00);
    assert_eq!(cpc.bus().memory.ram()[4 * 0x4000], 0x55);
    assert_eq!(cpc.query("gate_array.ram_config"), Some(Value::U8(0)));
}

#[test]
fn rom_select_and_write_through() {
    let program = [
        0x01, 0x00, 0xDF, // LD BC,$DF00
        0x3E, 0x07, //       LD A,7
        0xED, 0x79, //       OUT (C),A
        0x3A, 0x00, 0xC0, // LD A,($C000)
        0x32, 0x00, 0x01, // LD ($0100),A
        0x76, //             HALT
    ];
    let mut lower = vec![0; ROM_SIZE];
    lower[..program.len()].copy_from_slice(&program);
    let roms = RomSet {
        lower: Some(lower),
        upper: BTreeMap::from([(0, vec![0xB0; ROM_SIZE]), (7, vec![0xA7; ROM_SIZE])]),
    };
    let mut cpc = Cpc::new(&CpcConfig::default(), roms).expect("valid ROMs");
    assert_eq!(cpc.peek(0xC000), 0xB0);

    cpc.run_until_halt(1_000).expect("halts");
    assert_eq!(cpc.cpu().a(), 0xA7);
    assert_eq!(cpc.query("rom_select"), Some(Value::U8(7)));
    // The write went to RAM under the lower ROM.
    assert_eq!(cpc.peek(0x0100), 0x00);
    assert_eq!(cpc.bus().memory.ram()[0x0100], 0xA7);
}

#[test]
fn dma_copies_while_the_cpu_is_off_the_bus() {
    let mut program = vec![0x01, 0x00, 0xF9]; // LD BC,$F900
    // Source $4000, destination $8000, length 4, then start.
    let registers = [0x00, 0x40, 0x00, 0x80, 0x04, 0x00, 0x01];
    for (i, value) in registers.iter().enumerate() {
        program.extend_from_slice(&[0x3E, *value, 0xED, 0x79]); // LD A,n; OUT (C),A
        if i + 1 < registers.len() {
            program.push(0x0C); // INC C
        }
    }
    program.push(0x76); // HALT

    let mut cpc = make_cpc(&CpcConfig::default(), &program);
    cpc.load(0x4000, &[0xDE, 0xAD, 0xBE, 0xEF]);
    let summary = cpc.run_until_halt(1_000).expect("halts");

    assert_eq!(&cpc.bus().memory.ram()[0x8000..0x8004], &[0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(cpc.query("dma.active"), Some(Value::Bool(false)));
    assert_eq!(cpc.query("dma.remaining"), Some(Value::U16(0)));
    // 10 + 7 x (7 + 12) + 6 x 4 + 4, plus one granted T-state per byte.
    assert_eq!(summary.tstates, 171 + 4);
    assert!(!cpc.cpu().busack());
}

#[test]
fn disabled_dma_leaves_its_ports_floating() {
    let program = [
        0x01, 0x06, 0xF9, // LD BC,$F906
        0xED, 0x78, //       IN A,(C)
        0x76, //             HALT
    ];
    let config = CpcConfig {
        dma: machine_cpc::DmaConfig {
            enabled: false,
            ..machine_cpc::DmaConfig::default()
        },
        ..CpcConfig::default()
    };
    let mut cpc = make_cpc(&config, &program);
    cpc.run_until_halt(1_000).expect("halts");
    assert_eq!(cpc.cpu().a(), 0xFF);
    assert_eq!(cpc.query("dma.active"), None);
}

/// Counts CPU T-states; reads return the low byte of the count. Asserts WAIT
/// for a few T-states after every write.
struct Timer {
    ticks: Rc<Cell<u64>>,
    wait_left: u8,
}

impl Peripheral for Timer {
    fn name(&self) -> &str {
        "timer"
    }

    fn io_read(&mut self, _port: u16) -> u8 {
        self.ticks.get() as u8
    }

    fn io_write(&mut self, _port: u16, value: u8) {
        self.wait_left = value;
    }

    fn tick(&mut self) {
        self.ticks.set(self.ticks.get() + 1);
        self.wait_left = self.wait_left.saturating_sub(1);
    }

    fn wait(&self) -> bool {
        self.wait_left > 0
    }
}

const TIMER_SELECT: ChipSelect = ChipSelect {
    mask: 0xFF00,
    value: 0xFB00,
};

#[test]
fn peripheral_ticks_in_step_with_the_cpu() {
    let program = [
        0x3E, 0xFB, // LD A,$FB
        0xDB, 0x00, // IN A,($00)
        0x76, //       HALT
    ];
    let ticks = Rc::new(Cell::new(0));
    let mut cpc = make_cpc(&CpcConfig::default(), &program);
    let timer = Timer {
        ticks: Rc::clone(&ticks),
        wait_left: 0,
    };
    cpc.attach(TIMER_SELECT, Box::new(timer)).expect("valid select");

    let summary = cpc.run_until_halt(1_000).expect("halts");
    assert_eq!(ticks.get(), summary.tstates);
    // The port is read on the last T-state of the 11 T-state IN, after
    // 7 + 11 peripheral ticks.
    assert_eq!(cpc.cpu().a(), 18);
}

#[test]
fn peripheral_wait_stretches_the_cpu() {
    let program = [
        0x01, 0x00, 0xFB, // LD BC,$FB00
        0x3E, 0x05, //       LD A,5
        0xED, 0x79, //       OUT (C),A     WAIT held for the next 4 T-states
        0x00, //             NOP
        0x76, //             HALT
    ];
    let ticks = Rc::new(Cell::new(0));
    let mut cpc = make_cpc(&CpcConfig::default(), &program);
    let timer = Timer {
        ticks: Rc::clone(&ticks),
        wait_left: 0,
    };
    cpc.attach(TIMER_SELECT, Box::new(timer)).expect("valid select");

    let summary = cpc.run_until_halt(1_000).expect("halts");
    // The NOP fetch samples WAIT on its T2 and sees it for 3 T-states.
    assert_eq!(summary.tstates, 10 + 7 + 12 + (4 + 3) + 4);
    assert_eq!(ticks.get(), summary.tstates);
}

#[test]
fn attach_rejects_a_select_that_claims_every_port() {
    let mut cpc = make_cpc(&CpcConfig::default(), &[0x76]);
    let timer = Timer {
        ticks: Rc::new(Cell::new(0)),
        wait_left: 0,
    };
    let err = cpc
        .attach(ChipSelect { mask: 0, value: 0 }, Box::new(timer))
        .expect_err("mask 0");
    assert!(matches!(err, ConfigError::ChipSelect { ref name, .. } if name == "timer"));
}

#[test]
fn configuration_errors_surface_at_build() {
    let short_rom = RomSet {
        lower: Some(vec![0; 100]),
        upper: BTreeMap::new(),
    };
    assert!(matches!(
        Cpc::new(&CpcConfig::default(), short_rom),
        Err(ConfigError::RomSize { len: 100, .. })
    ));

    let ram = Target::Ram { page: 0 };
    let gap = CpcConfig {
        memory_map: Some(vec![MapEntry::new(0x0000, 0xBFFF, ram, ram)]),
        ..CpcConfig::default()
    };
    assert!(matches!(
        Cpc::new(&gap, RomSet::default()),
        Err(ConfigError::Gap { at: 0xC000 })
    ));

    let frozen = CpcConfig {
        raster: RasterConfig {
            tstates_per_line: 0,
            ..RasterConfig::default()
        },
        ..CpcConfig::default()
    };
    assert!(matches!(
        Cpc::new(&frozen, RomSet::default()),
        Err(ConfigError::Raster { .. })
    ));

    let json = CpcConfig::from_json(r#"{ "dma": { "select": { "mask": 0, "value": 0 } } }"#)
        .expect("well-formed JSON");
    assert!(matches!(
        Cpc::new(&json, RomSet::default()),
        Err(ConfigError::ChipSelect { .. })
    ));
}

#[test]
fn custom_map_from_json() {
    let config = CpcConfig::from_json(
        r#"{
            "memory_map": [
                { "start": 0, "end": 32767,
                  "read": { "kind": "ram", "page": 0 },
                  "write": { "kind": "ram", "page": 0 } },
                { "start": 32768, "end": 65535,
                  "read": { "kind": "unmapped" },
                  "write": { "kind": "unmapped" } }
            ]
        }"#,
    )
    .expect("parses");
    let program = [
        0x3E, 0x12, //       LD A,$12
        0x32, 0x00, 0x90, // LD ($9000),A
        0x3A, 0x00, 0x90, // LD A,($9000)
        0x76, //             HALT
    ];
    let mut cpc = make_cpc(&config, &program);
    cpc.run_until_halt(1_000).expect("halts");
    assert_eq!(cpc.cpu().a(), 0xFF);
}
