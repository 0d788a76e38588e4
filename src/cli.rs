//! Minimal CLI: schema → (plan | encode)
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use schema_accel::{
    create_accelerator_with, load, to_json_string, AcceleratorOptions, Schema, StringEscape, Value,
};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile a JSON schema into a specialized encoder; print its plan or encode documents with it
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// compile and print the encoding plan
    Plan(PlanOut),
    /// compile and encode input documents
    Encode(EncodeOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct PlanOut {
    /// schema document (JSON)
    #[arg(long, short)]
    schema: PathBuf,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct EncodeOut {
    /// schema document (JSON)
    #[arg(long, short)]
    schema: PathBuf,

    #[command(flatten)]
    input_settings: InputSettings,

    /// write string values without JSON escaping (trusted input only)
    #[arg(long, default_value_t = false)]
    trusted_strings: bool,

    /// compare every result with the generic encoder and report mismatches
    #[arg(long, default_value_t = false)]
    check: bool,

    /// output file, one encoded document per line (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_documents(&self) -> Result<Vec<serde_json::Value>> {
        let source_paths = resolve_file_path_patterns(&self.input)
            .map_err(|error| anyhow!("failed to resolve input file paths: {error}"))?;

        let mut out = Vec::new();
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file ({source_path_str})"))?;

            let documents: Vec<&str> = if self.ndjson {
                source.lines().filter(|line| !line.trim().is_empty()).collect()
            } else {
                vec![source.as_str()]
            };
            for (line, document) in documents.into_iter().enumerate() {
                let json_value = serde_json::from_str::<serde_json::Value>(document)
                    .with_context(|| {
                        format!("failed to parse JSON source file ({source_path_str}, document {line})")
                    })?;
                out.push(self.select(json_value, &source_path_str)?);
            }
        }
        Ok(out)
    }

    fn select(&self, json_value: serde_json::Value, source: &str) -> Result<serde_json::Value> {
        let Some(pointer) = self.json_pointer.as_deref() else {
            return Ok(json_value);
        };
        json_value
            .pointer(pointer)
            .cloned()
            .ok_or_else(|| anyhow!("JSON pointer {pointer} selects nothing in {source}"))
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Plan(target) => {
                let schema = read_schema(&target.schema)?;
                let accelerator = create_accelerator_with(&schema, AcceleratorOptions::default());
                write_output(target.out.as_deref(), &accelerator.plan().to_string())
            }
            Command::Encode(target) => {
                let schema = read_schema(&target.schema)?;
                let options = AcceleratorOptions {
                    string_escape: if target.trusted_strings {
                        StringEscape::Trusted
                    } else {
                        StringEscape::Json
                    },
                };
                let accelerator = create_accelerator_with(&schema, options);

                let documents = target.input_settings.load_documents()?;
                let encoded: Vec<(String, Option<String>)> = documents
                    .into_par_iter()
                    .map(|document| {
                        let value = Value::from(document);
                        let fast = accelerator.encode(&value);
                        let reference = target.check.then(|| to_json_string(&value));
                        (fast, reference)
                    })
                    .collect();

                if target.check {
                    report(&encoded)?;
                }

                let mut text = encoded.into_iter()
                    .map(|(fast, _)| fast)
                    .collect::<Vec<_>>()
                    .join("\n");
                text.push('\n');
                write_output(target.out.as_deref(), &text)
            }
        }
    }
}

fn read_schema(path: &Path) -> Result<Schema> {
    let source = std::fs::read(path)
        .with_context(|| format!("failed to read schema file ({})", path.display()))?;
    load::load_slice(&source)
        .with_context(|| format!("failed to load schema file ({})", path.display()))
}

fn write_output(out: Option<&Path>, text: &str) -> Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, text)
                .with_context(|| format!("failed to write {}", out.display()))
        }
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

/// Parse both encodings of every document and compare.
fn report(encoded: &[(String, Option<String>)]) -> Result<()> {
    let mut failures = 0usize;
    for (index, (fast, reference)) in encoded.iter().enumerate() {
        let Some(reference) = reference else { continue };
        let same = match (
            serde_json::from_str::<serde_json::Value>(fast),
            serde_json::from_str::<serde_json::Value>(reference),
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if same {
            eprintln!("{} document {index}", "✅ match".green());
        } else {
            failures += 1;
            eprintln!("{} document {index}", "❌ mismatch".red().bold());
            eprintln!("   accelerated: {fast}");
            eprintln!("   generic:     {reference}");
        }
    }
    if failures > 0 {
        bail!("{failures} of {} documents differ from the generic encoder", encoded.len());
    }
    Ok(())
}

// ————————————————————————————————————————————————————————————————————————————

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                match entry {
                    Ok(p) => {
                        matched_any = true;
                        out.push(p);
                    }
                    Err(e) => return Err(Box::new(e)),
                }
            }
            if !matched_any {
                return Err(format!("glob pattern matched no files: {pattern}").into());
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
