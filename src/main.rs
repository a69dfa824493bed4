//! cxxi CLI entry point.

mod cli;

use clap::Parser;
use cli::{Cli, Command, HeaderArgs};
use cxxi::{
    ArgumentValue, BuiltinKind, CxxInterface, InterfaceError, InterfaceOptions, InterfaceResult,
    TypeHandle,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Dump { header } => dump(&header),
        Command::Layout { header, names } => layout(&header, &names),
        Command::Instantiate {
            header,
            template,
            args,
        } => instantiate(&header, &template, &args),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        for diagnostic in e.diagnostics() {
            eprintln!("  {diagnostic}");
        }
        std::process::exit(1);
    }
}

/// Logs go to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn open(args: &HeaderArgs) -> InterfaceResult<CxxInterface> {
    let mut options = InterfaceOptions::new(args.language);
    if let Some(triple) = &args.target {
        options = options.with_target(triple.clone());
    }
    CxxInterface::open(&args.header, options)
}

fn dump(args: &HeaderArgs) -> InterfaceResult<()> {
    let interface = open(args)?;
    print!("{}", interface.unit()?.dump());
    Ok(())
}

fn layout(args: &HeaderArgs, names: &[String]) -> InterfaceResult<()> {
    let mut interface = open(args)?;
    for name in names {
        let handle = lookup(&mut interface, name)?;
        if !handle.is_valid() {
            println!("{name}: not found");
            continue;
        }
        print_layout(&mut interface, name, &handle)?;
    }
    Ok(())
}

fn instantiate(args: &HeaderArgs, template: &str, arguments: &[String]) -> InterfaceResult<()> {
    let mut interface = open(args)?;
    let handle = interface.resolve_type(template)?;

    let mut checked = Vec::with_capacity(arguments.len());
    for argument in arguments {
        let value = match argument.parse::<i64>() {
            Ok(number) => interface.create_template_argument(ArgumentValue::Integral(
                &TypeHandle::builtin(BuiltinKind::Int),
                number,
            ))?,
            Err(_) => {
                let ty = lookup(&mut interface, argument)?;
                interface.create_template_argument(ArgumentValue::Type(&ty))?
            }
        };
        checked.push(value);
    }

    let specialization = interface.instantiate_class_template(&handle, &checked)?;
    if !specialization.is_valid() {
        return Err(InterfaceError::InvalidHandle(format!(
            "'{template}' is not a class template"
        )));
    }
    let name = format!("{template}<{}>", arguments.join(", "));
    print_layout(&mut interface, &name, &specialization)
}

/// A builtin spelling or a declared type.
fn lookup(interface: &mut CxxInterface, name: &str) -> InterfaceResult<TypeHandle> {
    match BuiltinKind::ALL.into_iter().find(|kind| kind.spelling() == name) {
        Some(kind) => Ok(interface.builtin(kind)),
        None => interface.resolve_type(name),
    }
}

fn print_layout(
    interface: &mut CxxInterface,
    name: &str,
    handle: &TypeHandle,
) -> InterfaceResult<()> {
    let size = interface.type_size(handle)?;
    let align = interface.type_alignment(handle)?;
    println!("{name}: size {size}, align {align}");
    Ok(())
}
