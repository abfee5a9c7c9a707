use cu::pre::*;

mod cache;

use cache::{Demangler, MangleFormat};

/// Demangle C++ symbols from arguments or standard input
#[derive(Debug, clap::Parser, AsRef)]
struct CmdMain {
    /// Symbols to demangle; lines are read from stdin when empty
    pub symbols: Vec<String>,

    /// Treat inputs as MSVC-mangled instead of Itanium
    #[clap(short, long)]
    pub msvc: bool,

    /// Print the parsed tree as JSON instead of rendered text
    #[clap(short, long)]
    pub json: bool,

    /// JSON cache file to load and update
    #[clap(long)]
    pub cache: Option<String>,

    #[clap(flatten)]
    #[as_ref]
    pub common: cu::cli::Flags,
}

fn main() -> cu::Result<()> {
    let args = <CmdMain as clap::Parser>::parse();
    run(args)
}

fn run(args: CmdMain) -> cu::Result<()> {
    let format = if args.msvc {
        MangleFormat::Msvc
    } else {
        MangleFormat::Itanium
    };
    let demangler = Demangler::try_new(format, args.cache.as_ref().map(Into::into))?;

    if args.symbols.is_empty() {
        for line in std::io::stdin().lines() {
            let line = cu::check!(line, "failed to read symbol from stdin")?;
            process(&demangler, line.trim(), args.json);
        }
    } else {
        for symbol in &args.symbols {
            process(&demangler, symbol, args.json);
        }
    }

    demangler.flush_cache()
}

/// Demangle one symbol and print one output line. Symbols that cannot be
/// demangled echo back unchanged so a stream is never cut short.
fn process(demangler: &Demangler, symbol: &str, json_output: bool) {
    if symbol.is_empty() {
        return;
    }
    if json_output {
        let ast = match demangler.demangle_ast(symbol) {
            Ok(ast) => ast,
            Err(e) => {
                cu::warn!("cannot demangle '{symbol}': {e}");
                None
            }
        };
        match ast.as_ref().map(json::stringify) {
            Some(Ok(text)) => cu::print!("{text}"),
            Some(Err(e)) => cu::error!("failed to serialize tree for '{symbol}': {e}"),
            None => cu::print!("null"),
        }
        return;
    }
    match demangler.demangle(symbol) {
        Ok(text) => cu::print!("{text}"),
        Err(e) => {
            cu::warn!("cannot demangle '{symbol}': {e}");
            cu::print!("{symbol}");
        }
    }
}
