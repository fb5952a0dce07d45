//! Command-line driver: compile one source file and print a stage artifact.

use std::io::Write;
use std::process::ExitCode;
use std::fs;

use minicc::compiler::ir;
use minicc::error::Error;

#[derive(Debug, clap::Parser)]
#[clap(author, version, about)]
struct Args {
    /// Input source file
    input: String,

    /// Stage artifact to print: tokens, ast, symbols, ir, opt-ir, asm, json
    #[clap(short, long, default_value = "asm")]
    emit: String,

    /// Output file; prints to stdout when omitted
    #[clap(short, long)]
    output: Option<String>,
}

fn main() -> ExitCode {
    use clap::Parser;

    let args = Args::parse();

    match run(&args) {
        Ok(clean) => {
            if clean {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("\x1b[1;31merror:\x1b[0m {err}");
            ExitCode::from(2)
        }
    }
}

/// Runs one compilation, returning `Ok(true)` when no diagnostics were
/// reported.
fn run(args: &Args) -> Result<bool, Error> {
    let source =
        fs::read_to_string(&args.input).map_err(|err| Error::FileRead(args.input.clone(), err))?;

    let result = minicc::compile(&source);

    if !result.errors.is_empty() {
        eprint!("{}", result.errors);
    }

    let artifact = render(&result, &args.emit)?;

    match &args.output {
        Some(path) => {
            fs::write(path, artifact).map_err(|err| Error::FileWrite(path.clone(), err))?;
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(artifact.as_bytes())
                .map_err(|err| Error::FileWrite("<stdout>".into(), err))?;
        }
    }

    Ok(result.errors.is_empty())
}

/// Renders the requested stage artifact as text.
fn render(result: &minicc::CompilationResult, stage: &str) -> Result<String, Error> {
    let text = match stage {
        "tokens" => {
            let mut out = String::new();
            for token in &result.tokens {
                out.push_str(&token.to_string());
                out.push('\n');
            }
            out
        }
        "ast" => result.ast.to_string(),
        "symbols" => result.symbol_table.to_string(),
        "ir" => ir::to_text(&result.ir),
        "opt-ir" => ir::to_text(&result.optimized_ir),
        "asm" => result.assembly.clone(),
        "json" => {
            let value = serde_json::json!({
                "tokens": &result.tokens,
                "ast": result.ast.to_node(),
                "symbolTable": &result.symbol_table,
                "ir": &result.ir,
                "optimizedIr": &result.optimized_ir,
                "assembly": &result.assembly,
                "errors": &result.errors,
            });

            let mut out = serde_json::to_string_pretty(&value)
                .expect("compilation artifacts should serialize");
            out.push('\n');
            out
        }
        unknown => return Err(Error::UnknownStage(unknown.to_string())),
    };

    Ok(text)
}
