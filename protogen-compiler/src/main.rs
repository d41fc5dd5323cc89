// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Protocol IR analyzer and generator.

use argh::FromArgs;
use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::term::{self, termcolor};

use protogen_compiler::{analyzer, ast, backends, parser};

#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum OutputFormat {
    JSON,
    Rust,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "json" => Ok(Self::JSON),
            "rust" => Ok(Self::Rust),
            _ => Err(format!("could not parse {input:?}, valid option are 'json', 'rust'.")),
        }
    }
}

#[derive(FromArgs, Debug)]
/// Protocol IR analyzer and generator.
struct Opt {
    #[argh(switch)]
    /// print tool version and exit.
    version: bool,

    #[argh(option, default = "OutputFormat::Rust")]
    /// generate output in this format ("json", "rust").
    /// The input file is the JSON protocol IR.
    output_format: OutputFormat,

    #[argh(option)]
    /// write the output to this file instead of stdout.
    /// The file is written only if generation succeeds.
    output: Option<String>,

    #[argh(option)]
    /// generate Rust unit tests from the provided file.
    /// This file must point to a JSON formatted file with a list of test vectors.
    /// The tests call the decoders generated from the input file.
    test_file: Option<String>,

    #[argh(positional)]
    /// input file.
    input_file: Option<String>,

    #[argh(option)]
    /// exclude declarations from the generated output.
    exclude_declaration: Vec<String>,
}

/// Remove declarations listed in the input filter.
fn filter_declarations(protocol: ast::Protocol, exclude_declarations: &[String]) -> ast::Protocol {
    ast::Protocol {
        types: protocol
            .types
            .into_iter()
            .filter(|def| !exclude_declarations.iter().any(|id| id == def.id()))
            .collect(),
        ..protocol
    }
}

fn emit_diagnostic(sources: &ast::SourceDatabase, diagnostic: &Diagnostic<ast::FileId>) {
    let writer = termcolor::StandardStream::stderr(termcolor::ColorChoice::Auto);
    let config = term::Config::default();
    if let Err(err) = term::emit(&mut writer.lock(), &config, sources, diagnostic) {
        log::error!("could not print diagnostic: {err}");
    };
}

/// Hand the generated artifact to the sink selected on the command
/// line.
fn write_output(opt: &Opt, output: &str) -> Result<(), String> {
    match opt.output.as_ref() {
        Some(path) => {
            std::fs::write(path, output).map_err(|err| format!("could not write {path}: {err}"))?;
            log::info!("wrote {} bytes to {path}", output.len());
            Ok(())
        }
        None => {
            println!("{}", output);
            Ok(())
        }
    }
}

fn generate_backend(opt: &Opt, input_file: &str) -> Result<(), String> {
    let mut sources = ast::SourceDatabase::new();
    let protocol = match parser::parse_file(&mut sources, input_file) {
        Ok(protocol) => filter_declarations(protocol, &opt.exclude_declaration),
        Err(err) => {
            emit_diagnostic(&sources, &err);
            return Err(String::from("Error while parsing input"));
        }
    };

    if let Err(err) = analyzer::analyze(&protocol) {
        emit_diagnostic(&sources, &err.to_diagnostic());
        return Err(String::from("Analysis failed"));
    }

    let output = match opt.output_format {
        OutputFormat::JSON => backends::json::generate(&protocol)?,
        OutputFormat::Rust => match backends::rust::generate(&protocol) {
            Ok(output) => output,
            Err(err) => {
                emit_diagnostic(&sources, &err.to_diagnostic());
                return Err(String::from("Generation failed"));
            }
        },
    };
    write_output(opt, &output)
}

fn generate_tests(opt: &Opt, test_file: &str) -> Result<(), String> {
    match opt.output_format {
        OutputFormat::Rust => write_output(opt, &backends::rust::test::generate_tests(test_file)?),
        _ => Err(format!("Tests cannot be generated for the format {:?}", opt.output_format)),
    }
}

fn main() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let opt: Opt = argh::from_env();

    if opt.version {
        println!("protogenc {}\nCopyright (C) 2026 Google LLC", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    if let Some(test_file) = opt.test_file.as_ref() {
        return generate_tests(&opt, test_file);
    }

    let Some(input_file) = opt.input_file.as_ref() else {
        return Err("No input file is specified".to_owned());
    };
    generate_backend(&opt, input_file)
}
