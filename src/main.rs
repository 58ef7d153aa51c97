/*!
Headless command-line runner.

Loads a flat 6502 program image, runs it against the default memory
map, pumps serial output to stdout and stdin to the serial input queue,
and maps the run outcome to exit codes:

    0  the guest parked in a trap (normal completion for test ROMs)
    1  initialization failure (bad arguments, file errors)
    2  the guest executed an invalid opcode

Example: running Klaus Dormann's functional test image:

    term6502 6502_functional_test.bin --base 0x0400 --pc 0x0400
*/

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::Parser;
use log::info;

use term6502::{EmuError, Machine, RunExit};

/// Cycle-aware 6502 emulator with memory-mapped serial I/O.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Flat binary program image.
    image: PathBuf,

    /// Load address of the image (hex accepted as 0xNNNN).
    #[arg(long, default_value = "0x0400", value_parser = parse_addr)]
    base: u16,

    /// Override the initial program counter after reset.
    #[arg(long, value_parser = parse_addr)]
    pc: Option<u16>,

    /// Nominal clock frequency in Hz.
    #[arg(long, default_value_t = 1_000_000)]
    freq: u64,

    /// Trace every instruction (also needs RUST_LOG=debug).
    #[arg(long)]
    debug: bool,

    /// Keep running when the guest enters a jump-to-self loop.
    #[arg(long)]
    no_trap_detect: bool,
}

fn parse_addr(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("{e}"))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("term6502: {e}");
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> term6502::Result<ExitCode> {
    let mut machine = Machine::new(args.freq)?;
    machine.load_file(&args.image, args.base)?;
    if let Some(pc) = args.pc {
        machine.set_pc(pc);
    }
    machine.set_debug(args.debug);
    machine.set_stop_on_trap(!args.no_trap_detect);
    machine.run();

    spawn_stdin_pump(&machine);

    // Drain serial output on the main thread until the guest stops.
    let stdout = io::stdout();
    while machine.is_running() {
        pump_output(&machine, &stdout);
        thread::sleep(Duration::from_millis(1));
    }
    pump_output(&machine, &stdout);

    let exit = machine.wait();
    let regs = machine.snapshot_registers();
    info!(
        "final state: PC={:#06X} A={:#04X} X={:#04X} Y={:#04X} SP={:#04X} P={:#04X}",
        regs.pc, regs.a, regs.x, regs.y, regs.sp, regs.status
    );
    match exit {
        RunExit::Trapped { pc } => {
            info!("guest trapped at {pc:#06X}");
            Ok(ExitCode::SUCCESS)
        }
        RunExit::Stopped => Ok(ExitCode::SUCCESS),
        RunExit::Fault(e @ EmuError::InvalidOpcode { .. }) => {
            eprintln!("term6502: {e}");
            Ok(ExitCode::from(2))
        }
        RunExit::Fault(e) => Err(e),
    }
}

fn pump_output(machine: &Machine, stdout: &io::Stdout) {
    let mut wrote = false;
    let mut handle = stdout.lock();
    while let Some(b) = machine.pop_output() {
        let _ = handle.write_all(&[b]);
        wrote = true;
    }
    if wrote {
        let _ = handle.flush();
    }
}

/// Forward stdin bytes to the serial input queue. The thread parks on
/// the blocking read and dies with the process.
fn spawn_stdin_pump(machine: &Machine) {
    let input = machine.input_queue();
    thread::spawn(move || {
        for byte in io::stdin().lock().bytes() {
            match byte {
                Ok(b) => {
                    // Retry until the guest makes room.
                    while input.enqueue(b).is_err() {
                        thread::sleep(Duration::from_millis(1));
                    }
                }
                Err(_) => break,
            }
        }
    });
}
