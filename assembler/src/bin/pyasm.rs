use clap::Parser as ClapParser;
use std::{fs, path::PathBuf, process};

use assembler::bytecode::{CodeUnit, disassemble};
use assembler::{Assembler, AssemblerOptions, CodeInfo};

#[derive(ClapParser, Debug)]
#[command(author, version, about = "Assemble stack-VM bytecode from disassembly text", long_about = None)]
struct Cli {
    /// Assembly source file
    input: PathBuf,

    /// Write the raw bytecode to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the assembled instructions in disassembler layout
    #[arg(long)]
    listing: bool,

    /// Print the bytecode and line table as hex
    #[arg(long)]
    hex: bool,

    /// Build a code unit and print its disassembly
    #[arg(long)]
    code: bool,

    /// Line number of the first source line
    #[arg(long, default_value_t = 1)]
    first_line: u32,

    /// File name recorded in the code unit (defaults to the input path)
    #[arg(long)]
    filename: Option<String>,

    /// Fail on unknown names instead of adding them to the tables
    #[arg(long)]
    no_add_names: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let source = match fs::read_to_string(&cli.input) {
        Ok(content) => content,
        Err(err) => {
            eprintln!("Error reading file '{}': {}", cli.input.display(), err);
            process::exit(1);
        }
    };

    let options = AssemblerOptions {
        add_names: !cli.no_add_names,
        filename: cli
            .filename
            .clone()
            .unwrap_or_else(|| cli.input.display().to_string()),
        first_line: cli.first_line,
        ..Default::default()
    };

    let mut asm = match Assembler::with_source(&source, options) {
        Ok(asm) => asm,
        Err(err) => {
            eprintln!("Error assembling {}: {}", cli.input.display(), err);
            process::exit(1);
        }
    };

    if let Err(err) = run(&cli, &mut asm) {
        eprintln!("Error assembling {}: {}", cli.input.display(), err);
        process::exit(1);
    }
}

fn run(cli: &Cli, asm: &mut Assembler) -> Result<(), Box<dyn std::error::Error>> {
    if cli.listing {
        print!("{}", asm.disassemble()?);
    }

    if cli.hex {
        println!("bytecode:   {}", hex(asm.bytecode()?));
        println!("line table: {}", hex(asm.line_table()?.as_bytes()));
    }

    if cli.code {
        let local_count = asm.varnames().len() as u32;
        let code = asm.build_code(CodeInfo {
            local_count,
            ..Default::default()
        })?;
        dump_code(&code)?;
    }

    if let Some(path) = &cli.output {
        fs::write(path, asm.bytecode()?)?;
        log::info!("wrote {} bytes to {}", asm.bytecode()?.len(), path.display());
    }

    // each diagnostic was already reported through log::warn! while assembling
    log::info!("{} explicit line numbers or offsets ignored", asm.diagnostics().len());
    Ok(())
}

fn dump_code(code: &CodeUnit) -> Result<(), Box<dyn std::error::Error>> {
    println!("== {} ({}) ==", code.name, code.filename);
    println!("-- constants --");
    for (idx, value) in code.constants.iter().enumerate() {
        println!("[{idx}] {value}");
    }
    for (title, table) in [
        ("names", &code.names),
        ("varnames", &code.varnames),
        ("freevars", &code.freevars),
    ] {
        if !table.is_empty() {
            println!("-- {title} --");
            for (idx, name) in table.iter().enumerate() {
                println!("[{idx}] {name}");
            }
        }
    }
    println!("-- code --");
    print!("{}", disassemble(code)?);
    Ok(())
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
