use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::{fs, process};

use clap::{ArgAction, Parser};
use log::{debug, info};

use accgen::bytecode::ObjectCode;
use accgen::bytecode::disasm::{print_listing, print_stats};
use accgen::compile::generate;
use accgen::frontend::lexer::Lexer;
use accgen::frontend::parse_source;
use accgen::frontend::token_dumper::TokenDumper;
use accgen::runtime::{Machine, MachineConfig};

#[derive(Parser, Debug)]
#[command(
    name = "accgen",
    version,
    about = "Compiles programs to code for a single-accumulator machine"
)]
struct Cli {
    /// Source program.
    input: PathBuf,

    /// Output file; defaults to the input with a `.mr` extension.
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,

    /// Write the postcard encoding instead of text.
    #[arg(long, action = ArgAction::SetTrue)]
    binary: bool,

    /// Print an annotated listing and opcode statistics.
    #[arg(long, action = ArgAction::SetTrue)]
    listing: bool,

    /// Print the token stream and stop.
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "ast")]
    tokens: bool,

    /// Do not color `--tokens` output.
    #[arg(long = "no-color", action = ArgAction::SetTrue, requires = "tokens")]
    no_color: bool,

    /// Print the parsed program and stop.
    #[arg(long, action = ArgAction::SetTrue)]
    ast: bool,

    /// Execute the result, reading whitespace separated integers from stdin.
    #[arg(long, action = ArgAction::SetTrue)]
    run: bool,

    /// Step limit for `--run`.
    #[arg(long = "max-steps", value_name = "N", requires = "run")]
    max_steps: Option<usize>,

    /// More log output (`-v` debug, `-vv` trace).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let source = match fs::read_to_string(&cli.input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Failed to read '{}': {}", cli.input.display(), e);
            process::exit(1);
        }
    };

    if cli.tokens {
        dump_tokens(&source, cli.no_color);
        return;
    }

    let code = compile_program(&source, &cli);

    if cli.listing {
        print_listing(&code);
        print_stats(&code);
    }

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output(&cli.input, cli.binary));
    if let Err(e) = write_output(&code, &output, cli.binary) {
        eprintln!("Failed to write '{}': {}", output.display(), e);
        process::exit(1);
    }
    info!("wrote {} instructions to {}", code.len(), output.display());

    if cli.run {
        run_program(&code, cli.max_steps);
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn dump_tokens(source: &str, no_color: bool) {
    match Lexer::new(source).tokenize() {
        Ok(tokens) => {
            let mut dumper = TokenDumper::new();
            if no_color {
                dumper = dumper.no_color();
            }
            dumper.dump(&tokens);
        }
        Err(e) => {
            eprintln!("Lexer error: {}", e);
            process::exit(1);
        }
    }
}

fn compile_program(source: &str, cli: &Cli) -> ObjectCode {
    let program = match parse_source(source) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    if cli.ast {
        println!("{:#?}", program);
        process::exit(0);
    }

    let compilation = match generate(&program) {
        Ok(compilation) => compilation,
        Err(e) => {
            eprintln!("Compile error: {}", e);
            process::exit(2);
        }
    };

    if !compilation.is_success() {
        eprint!("{}", compilation.diagnostics);
        eprintln!(
            "{} error(s) in {}",
            compilation.diagnostics.len(),
            cli.input.display()
        );
        process::exit(1);
    }

    debug!("static cost {}", compilation.code.static_cost());
    compilation.code
}

fn default_output(input: &Path, binary: bool) -> PathBuf {
    input.with_extension(if binary { "mrb" } else { "mr" })
}

fn write_output(code: &ObjectCode, path: &Path, binary: bool) -> io::Result<()> {
    if binary {
        let bytes = code
            .to_bytes()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        fs::write(path, bytes)
    } else {
        fs::write(path, code.to_string())
    }
}

fn run_program(code: &ObjectCode, max_steps: Option<usize>) {
    let mut text = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut text) {
        eprintln!("Failed to read input: {}", e);
        process::exit(1);
    }

    let mut input = Vec::new();
    for word in text.split_whitespace() {
        match word.parse::<i64>() {
            Ok(n) => input.push(n),
            Err(_) => {
                eprintln!("Input is not an integer: '{}'", word);
                process::exit(1);
            }
        }
    }

    let mut machine = Machine::with_config(MachineConfig { max_steps }).with_input(input);
    if let Err(e) = machine.run(&code.instructions) {
        eprintln!("Runtime error: {}", e);
        process::exit(1);
    }

    for value in machine.output() {
        println!("> {}", value);
    }
    println!("cost: {} ({} steps)", machine.cost(), machine.steps());
}
