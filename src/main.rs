//! TD4 Emulator - CLI Entry Point
//!
//! Commands:
//! - `td4-emu run <program>` - Run a ROM image or assembly file
//! - `td4-emu trace <program>` - Single-step and print every instruction
//! - `td4-emu asm <source>` - Assemble to a ROM image
//! - `td4-emu disasm <program>` - Disassemble a ROM image

use clap::{Parser, Subcommand};
use std::path::Path;
use td4::config::DEFAULT_CLI_MAX_STEPS;
use td4::{Cpu, CpuError, Emulator, Rom, RunConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "td4-emu")]
#[command(version = "0.1.0")]
#[command(about = "An emulator of the TD4 4-bit CPU")]
struct Cli {
    /// Log every executed instruction (same as RUST_LOG=td4=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the ROM image (.bin) or assembly file (.s/.asm)
        program: String,
        /// Value on the input port (0-15)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..16))]
        input: Option<u8>,
        /// Delay between steps in milliseconds
        #[arg(short, long)]
        tick_ms: Option<u64>,
        /// Stop after this many steps (default: 10000)
        #[arg(short, long)]
        max_steps: Option<u64>,
        /// JSON run configuration
        #[arg(short, long)]
        config: Option<String>,
        /// Print the final machine state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Single-step a program and print each instruction
    Trace {
        /// Path to the ROM image (.bin) or assembly file (.s/.asm)
        program: String,
        /// Value on the input port (0-15)
        #[arg(short, long, default_value = "0", value_parser = clap::value_parser!(u8).range(0..16))]
        input: u8,
        /// Maximum number of steps to trace
        #[arg(short, long, default_value = "64")]
        steps: u64,
    },
    /// Assemble source to a ROM image
    Asm {
        /// Path to the source file
        source: String,
        /// Output image (defaults to the source name with .bin)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble a ROM image to readable text
    Disasm {
        /// Path to the ROM image
        program: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Run { program, input, tick_ms, max_steps, config, json }) => {
            let mut run_config = match config {
                Some(path) => RunConfig::load(&path).unwrap_or_else(|e| {
                    fail(&format!("Failed to load config {}: {}", path, e))
                }),
                None => RunConfig::default(),
            };
            if let Some(input) = input {
                run_config.input = input;
            }
            if let Some(tick_ms) = tick_ms {
                run_config.tick_ms = tick_ms;
            }
            if max_steps.is_some() {
                run_config.max_steps = max_steps;
            }
            let run_config = run_config.or_max_steps(DEFAULT_CLI_MAX_STEPS);
            run_program(&program, run_config, json);
        }
        Some(Commands::Trace { program, input, steps }) => {
            trace_program(&program, input, steps);
        }
        Some(Commands::Asm { source, output }) => {
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { program }) => {
            disassemble_file(&program);
        }
        None => {
            println!("TD4 Emulator v0.1.0");
            println!("A 4-bit CPU with 16 bytes of ROM");
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "warn,td4=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn fail(message: &str) -> ! {
    eprintln!("❌ {}", message);
    std::process::exit(1);
}

fn load(path: &str) -> Rom {
    td4::load_program(path).unwrap_or_else(|e| fail(&format!("Failed to load {}: {}", path, e)))
}

fn print_state(cpu: &Cpu) {
    let regs = &cpu.regs;
    println!("PC:    {:2}", regs.pc());
    println!("A:     {:2} ({:04b})", regs.a(), regs.a());
    println!("B:     {:2} ({:04b})", regs.b(), regs.b());
    println!("IN:    {:2} ({:04b})", regs.input(), regs.input());
    println!("OUT:   {:2} ({:04b})", regs.output(), regs.output());
    println!("Carry: {}", regs.carry());
    println!("State: {:?}", cpu.state());
}

fn run_program(path: &str, config: RunConfig, json: bool) {
    let rom = load(path);
    println!("🔧 Running: {}", path);

    let mut cpu = Cpu::with_rom(rom);
    cpu.regs.set_input(config.input);

    let mut emu = Emulator::with_config(cpu, config);
    if let Err(e) = emu.run(|_| {}) {
        fail(&format!("Failed to start: {}", e));
    }
    let report = match emu.wait() {
        Some(report) => report,
        None => fail("Run did not start"),
    };
    let cpu = emu.snapshot();

    println!();
    println!("━━━ Result ━━━");
    println!("Steps: {}", report.steps);

    if json {
        match serde_json::to_string_pretty(&cpu) {
            Ok(text) => println!("{}", text),
            Err(e) => fail(&format!("Failed to encode state: {}", e)),
        }
    } else {
        print_state(&cpu);
    }

    match report.error {
        Some(CpuError::Halted) => println!("✓ Halted"),
        Some(e) => fail(&format!("CPU error at PC={}: {}", cpu.regs.pc(), e)),
        None => println!("⚠️  Stopped before halting. Use --max-steps to run longer."),
    }
}

fn trace_program(path: &str, input: u8, steps: u64) {
    let mut cpu = Cpu::with_rom(load(path));
    cpu.regs.set_input(input);

    println!("━━━ Trace ━━━");

    for _ in 0..steps {
        let pc = cpu.regs.pc();
        let byte = cpu.rom.fetch(pc);

        match cpu.step() {
            Ok(()) => {
                println!(
                    "{:02}: {:02X}  {:<12} A={:2} B={:2} OUT={:2} C={}",
                    pc,
                    byte,
                    td4::disassemble(byte),
                    cpu.regs.a(),
                    cpu.regs.b(),
                    cpu.regs.output(),
                    cpu.regs.carry() as u8,
                );
            }
            Err(CpuError::Halted) => {
                println!("{:02}: {:02X}  {}", pc, byte, td4::disassemble(byte));
                println!("✓ Halted after {} steps", cpu.cycles());
                return;
            }
            Err(e) => fail(&format!("CPU error at PC={}: {}", pc, e)),
        }
    }

    println!("⚠️  Reached step limit ({}). Use --steps to increase.", steps);
}

fn assemble_file(source_path: &str, output: Option<String>) {
    let out_path = output.unwrap_or_else(|| {
        Path::new(source_path).with_extension("bin").display().to_string()
    });

    println!("📝 Assembling: {} → {}", source_path, out_path);

    let source = std::fs::read_to_string(source_path)
        .unwrap_or_else(|e| fail(&format!("Failed to read file: {}", e)));

    let rom = td4::asm::assemble_rom(&source)
        .unwrap_or_else(|e| fail(&format!("Assembly error: {}", e)));

    if let Err(e) = td4::save_bin(&out_path, &rom) {
        fail(&format!("Failed to save image: {}", e));
    }

    println!("✓ Saved to {}", out_path);
}

fn disassemble_file(path: &str) {
    println!("📖 Disassembling: {}", path);
    println!();
    println!("{}", td4::disassemble_rom(&load(path)));
}
