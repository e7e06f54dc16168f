//! Headless CPC runner.
//!
//! Builds a machine from a JSON configuration, loads raw binaries into RAM
//! and runs until HALT, a tick budget, or a fixed number of frames.

use std::io;
use std::path::{Path, PathBuf};
use std::process;

use emu_core::Observable;
use machine_cpc::{Cpc, CpcConfig, RomSet, RunError, RunSummary};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Default T-state budget: ten seconds at 4 MHz.
const DEFAULT_MAX_TICKS: u64 = 40_000_000;

#[derive(Debug)]
struct CliArgs {
    config_path: Option<PathBuf>,
    loads: Vec<(PathBuf, u16)>,
    pc: Option<u16>,
    max_ticks: u64,
    frames: Option<u64>,
    json: bool,
}

fn parse_hex(text: &str) -> Option<u16> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix('$'))
        .unwrap_or(text);
    u16::from_str_radix(digits, 16).ok()
}

fn usage_error(message: &str) -> ! {
    eprintln!("{message}");
    eprintln!("Try --help");
    process::exit(1);
}

fn print_usage() {
    eprintln!("Usage: cpc-run [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <file>        JSON machine configuration");
    eprintln!("  --load <file>@<addr>   Load a raw binary at a hex address (repeatable)");
    eprintln!("  --pc <addr>            Start address [default: 0000]");
    eprintln!(
        "  --max-ticks <n>        T-state budget before giving up [default: {DEFAULT_MAX_TICKS}]"
    );
    eprintln!("  --frames <n>           Run a fixed number of frames instead of to HALT");
    eprintln!("  --json                 Print the final state as JSON");
    eprintln!();
    eprintln!("Logging is controlled by RUST_LOG (e.g. RUST_LOG=machine_cpc=debug).");
}

fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, String> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} expects a value"))
}

fn parse_count(text: &str, flag: &str) -> Result<u64, String> {
    text.parse()
        .map_err(|_| format!("{flag} expects a decimal count, got {text}"))
}

/// Parse the arguments after the program name. `Ok(None)` means `--help`.
fn parse_args(args: &[String]) -> Result<Option<CliArgs>, String> {
    let mut cli = CliArgs {
        config_path: None,
        loads: Vec::new(),
        pc: None,
        max_ticks: DEFAULT_MAX_TICKS,
        frames: None,
        json: false,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                cli.config_path = Some(PathBuf::from(flag_value(args, i, "--config")?));
            }
            "--load" => {
                i += 1;
                let value = flag_value(args, i, "--load")?;
                let (file, addr) = value
                    .rsplit_once('@')
                    .ok_or_else(|| "--load expects <file>@<hex address>".to_string())?;
                let addr = parse_hex(addr).ok_or_else(|| format!("bad load address: {addr}"))?;
                cli.loads.push((PathBuf::from(file), addr));
            }
            "--pc" => {
                i += 1;
                let value = flag_value(args, i, "--pc")?;
                let pc = parse_hex(value).ok_or_else(|| format!("bad start address: {value}"))?;
                cli.pc = Some(pc);
            }
            "--max-ticks" => {
                i += 1;
                cli.max_ticks = parse_count(flag_value(args, i, "--max-ticks")?, "--max-ticks")?;
            }
            "--frames" => {
                i += 1;
                cli.frames = Some(parse_count(flag_value(args, i, "--frames")?, "--frames")?);
            }
            "--json" => {
                cli.json = true;
            }
            "--help" | "-h" => return Ok(None),
            other => return Err(format!("Unknown argument: {other}")),
        }
        i += 1;
    }

    Ok(Some(cli))
}

fn build(cli: &CliArgs) -> Result<Cpc, machine_cpc::ConfigError> {
    let (config, base) = match &cli.config_path {
        Some(path) => (
            CpcConfig::load(path)?,
            path.parent().map_or_else(PathBuf::new, Path::to_path_buf),
        ),
        None => (CpcConfig::default(), PathBuf::new()),
    };
    let roms = RomSet::load(&config, &base)?;
    let mut cpc = Cpc::new(&config, roms)?;

    for (path, addr) in &cli.loads {
        let data = std::fs::read(path).map_err(|source| machine_cpc::ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), addr, len = data.len(), "binary loaded");
        cpc.load(*addr, &data);
    }
    if let Some(pc) = cli.pc {
        cpc.cpu_mut().set_pc(pc);
    }
    Ok(cpc)
}

/// Run the machine the way the flags ask: a fixed number of frames, or to
/// HALT within the T-state budget.
fn run(cpc: &mut Cpc, cli: &CliArgs) -> Result<Option<RunSummary>, RunError> {
    if let Some(frames) = cli.frames {
        for _ in 0..frames {
            cpc.run_frame();
        }
        return Ok(None);
    }
    cpc.run_until_halt(cli.max_ticks).map(Some)
}

fn print_text(cpc: &Cpc, summary: Option<&RunSummary>) {
    let cpu = cpc.cpu();
    let regs = cpu.registers();
    println!(
        "AF={:04X} BC={:04X} DE={:04X} HL={:04X} IX={:04X} IY={:04X} SP={:04X} PC={:04X}",
        regs.af(),
        cpu.bc(),
        cpu.de(),
        cpu.hl(),
        cpu.ix(),
        cpu.iy(),
        cpu.sp(),
        cpu.pc()
    );
    println!(
        "AF'={:04X} BC'={:04X} DE'={:04X} HL'={:04X} I={:02X} R={:02X} IM={} IFF1={}",
        regs.af_alt(),
        regs.bc_alt(),
        regs.de_alt(),
        regs.hl_alt(),
        regs.i,
        regs.r,
        regs.im,
        u8::from(regs.iff1)
    );
    println!(
        "T-states: {}  master ticks: {}  frames: {}",
        cpu.total_ticks().get(),
        cpc.master_clock(),
        cpc.frame_count()
    );
    if let Some(summary) = summary {
        println!("halted after {} T-states", summary.tstates);
    }
}

fn print_json(cpc: &Cpc, summary: Option<&RunSummary>) -> serde_json::Result<()> {
    let state = serde_json::json!({
        "summary": summary,
        "cpu": cpc.cpu().snapshot(),
        "gate_array": cpc.bus().gate_array.snapshot(),
        "master_clock": cpc.master_clock(),
        "frame_count": cpc.frame_count(),
    });
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("machine_cpc=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(Some(cli)) => cli,
        Ok(None) => {
            print_usage();
            process::exit(0);
        }
        Err(message) => usage_error(&message),
    };
    let mut cpc = match build(&cli) {
        Ok(cpc) => cpc,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    let mut exit_code = 0;
    let summary = match run(&mut cpc, &cli) {
        Ok(summary) => summary,
        Err(e) => {
            error!("{e}");
            exit_code = 1;
            None
        }
    };

    if cli.json {
        if let Err(e) = print_json(&cpc, summary.as_ref()) {
            error!("cannot encode state: {e}");
            process::exit(1);
        }
    } else {
        print_text(&cpc, summary.as_ref());
    }
    process::exit(exit_code);
}
