use std::{fs, path::Path, process::ExitCode};

use cairn::{Compilation, DiskLoader, NoopTracer, StdConsole, TreeOptions};

mod args;

use args::{ArgKind, ArgParser};

fn get_args() -> Result<ArgParser, String> {
    let mut args = ArgParser::new();

    args.add_positional("codefilename");

    args.add("tree", "t", ArgKind::Flag);
    args.add("tree-all", "A", ArgKind::Flag);
    args.add("tree-pointers", "P", ArgKind::Flag);
    args.add("tree-types", "T", ArgKind::Flag);
    args.add("tree-symbol-ids", "I", ArgKind::Flag);
    args.add("stats", "s", ArgKind::Flag);
    args.add("dis", "d", ArgKind::Flag);
    args.add("symbols", "S", ArgKind::Flag);
    args.add("no-exec", "n", ArgKind::Flag);

    args.parse(std::env::args().skip(1))?;

    Ok(args)
}

fn compile(args: &ArgParser) -> Result<Compilation, String> {
    let path = Path::new(args.positional(0));
    let source =
        fs::read_to_string(path).map_err(|err| format!("could not read {}: {err}", path.display()))?;
    let root = path.parent().unwrap_or_else(|| Path::new("."));
    let loader = DiskLoader::new(root);

    let compilation = Compilation::compile(&source, &loader).map_err(|err| err.to_string())?;

    if args.flag("tree") {
        let all = args.flag("tree-all");
        let options = TreeOptions {
            pointers: args.flag("tree-pointers") || all,
            types: args.flag("tree-types") || all,
            symbol_ids: args.flag("tree-symbol-ids") || all,
        };
        eprintln!("Syntax Tree:");
        eprint!("{}", compilation.print_tree(options));
    }

    if args.flag("symbols") {
        eprintln!("Symbol Table:");
        eprint!("{}", compilation.dump_symbols());
    }

    if args.flag("dis") {
        eprintln!("Assembly:");
        eprint!("{}", compilation.disassemble());
    }

    Ok(compilation)
}

fn run_bytecode(args: &ArgParser, compilation: &Compilation) -> Result<(), String> {
    let (exit_code, stats) = compilation
        .run(StdConsole, NoopTracer)
        .map_err(|err| err.to_string())?;
    println!("Program finished with exit code {exit_code} ({})", exit_code as i32);
    if args.flag("stats") {
        print!("{}", stats.analytics());
    }
    Ok(())
}

fn main() -> ExitCode {
    let result = get_args().and_then(|args| {
        let compilation = compile(&args)?;
        if !args.flag("no-exec") {
            run_bytecode(&args, &compilation)?;
        }
        Ok(())
    });
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
