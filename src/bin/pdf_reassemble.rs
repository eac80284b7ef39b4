//! Reassemble a PDF
//!
//! Loads a PDF, rebuilds its page tree, renumbers every object and writes a
//! fresh file with a classic cross-reference table.
//!
//! Usage:
//!   cargo run --release --bin pdf_reassemble -- input.pdf output.pdf
//!   cargo run --release --bin pdf_reassemble -- input.pdf out --indent 2 --no-compress
//!
//! Options:
//!   --indent N          pretty-print with N spaces per level
//!   --no-compress       leave unfiltered streams uncompressed
//!   --no-group          keep all pages directly under the page tree root
//!   --group-size N      maximum kids per page tree node (default 16)
//!   --pdf-version V     version for the header and catalog (default 1.7)
//!   --strip-root        drop every catalog entry except /Type and /Pages
//!   --strict            reject malformed input instead of repairing it
//!
//! Set `RUST_LOG=debug` for progress output.

use pdf_assembler::{AssemblerOptions, Indent, OutputFormat, ParserOptions, PdfAssembler, PdfInput};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

struct ReassembleConfig {
    input: PathBuf,
    output: String,
    options: AssemblerOptions,
    strip_root: bool,
    strict: bool,
}

impl ReassembleConfig {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut positional = Vec::new();
        let mut options = AssemblerOptions::default();
        let mut strip_root = false;
        let mut strict = false;

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--indent" => {
                    let width = value_of(&args, &mut i)?;
                    options = options.with_indent(Indent::Width(parse_number(&width)?));
                },
                "--no-compress" => options = options.with_compress(false),
                "--no-group" => options = options.with_group_pages(false),
                "--group-size" => {
                    let size = value_of(&args, &mut i)?;
                    options = options.with_page_group_size(parse_number(&size)?);
                },
                "--pdf-version" => {
                    let version = value_of(&args, &mut i)?;
                    options = options.with_pdf_version(version);
                },
                "--strip-root" => strip_root = true,
                "--strict" => strict = true,
                flag if flag.starts_with("--") => return Err(format!("unknown option {}", flag)),
                other => positional.push(other.to_string()),
            }
            i += 1;
        }

        let [input, output] = <[String; 2]>::try_from(positional)
            .map_err(|_| "usage: pdf_reassemble <input.pdf> <output> [options]".to_string())?;
        options.validate().map_err(|e| e.to_string())?;
        Ok(Self {
            input: PathBuf::from(input),
            output,
            options,
            strip_root,
            strict,
        })
    }
}

fn value_of(args: &[String], i: &mut usize) -> Result<String, String> {
    *i += 1;
    args.get(*i)
        .cloned()
        .ok_or_else(|| format!("{} needs a value", args[*i - 1]))
}

fn parse_number(text: &str) -> Result<usize, String> {
    text.parse().map_err(|_| format!("{:?} is not a number", text))
}

fn run(config: ReassembleConfig) -> pdf_assembler::Result<()> {
    let start = Instant::now();
    let bytes = fs::read(&config.input)?;
    let input_len = bytes.len();

    let assembler = PdfAssembler::new()?;
    let parser_options = if config.strict {
        ParserOptions::strict()
    } else {
        ParserOptions::lenient()
    };
    assembler.set_parser_options(parser_options).wait()?;
    assembler.load(PdfInput::Bytes(bytes)).wait()?;
    let pages = assembler.count_pages().wait()?;
    if config.strip_root {
        assembler.remove_root_entries(None).wait()?;
    }
    assembler.set_options(config.options).wait()?;

    let output = assembler.assemble(OutputFormat::from(config.output.as_str())).wait()?;
    let file = match output {
        pdf_assembler::PdfOutput::File(file) => file,
        other => pdf_assembler::PdfFile::new(&config.output, other.into_vec()),
    };
    fs::write(&file.file_name, &file.data)?;

    println!(
        "{} ({} bytes, {} pages) -> {} ({} bytes) in {:.2?}",
        config.input.display(),
        input_len,
        pages,
        file.file_name,
        file.data.len(),
        start.elapsed()
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let config = match ReassembleConfig::from_args() {
        Ok(config) => config,
        Err(message) => {
            eprintln!("Error: {}", message);
            return ExitCode::from(2);
        },
    };

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        },
    }
}
