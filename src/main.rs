use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use krm_replacer::config::{load_from_path, Replacer, ReplacerConfig};
use krm_replacer::extender::ExtenderRegistry;
use krm_replacer::path::ExtendedPath;
use krm_replacer::resource::Resource;
use krm_replacer::stream;
use similar::{ChangeTag, TextDiff};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "KRM_REPLACER_LOG";

#[derive(Parser)]
#[command(name = "krm-replacer")]
#[command(about = "Copy values between fields of KRM resources", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply replacements and write the resulting resources
    Apply {
        /// Replacement configuration (YAML or TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Select sources from these resources instead of the inputs
        #[arg(short, long)]
        sources: Option<PathBuf>,

        /// Write results back to the input files instead of stdout
        #[arg(short, long)]
        in_place: bool,

        /// Show unified diff of changes on stderr
        #[arg(short, long)]
        diff: bool,

        /// Keep internal.config.kubernetes.io annotations in the output
        #[arg(long)]
        keep_build_annotations: bool,

        /// Resource files or directories (stdin when omitted)
        inputs: Vec<PathBuf>,
    },

    /// Run replacements without writing and list resources that would change
    Check {
        /// Replacement configuration (YAML or TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Select sources from these resources instead of the inputs
        #[arg(short, long)]
        sources: Option<PathBuf>,

        /// Resource files or directories (stdin when omitted)
        inputs: Vec<PathBuf>,
    },

    /// Show how a field path is split into resource path and extensions
    Explain {
        /// Field path, e.g. data.config.!!yaml.spec.url
        path: String,
    },
}

/// One input stream as read, for diffs and in-place writes.
struct Input {
    origin: Option<PathBuf>,
    original: String,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            config,
            sources,
            in_place,
            diff,
            keep_build_annotations,
            inputs,
        } => cmd_apply(
            &config,
            sources.as_deref(),
            in_place,
            diff,
            keep_build_annotations,
            &inputs,
        ),

        Commands::Check {
            config,
            sources,
            inputs,
        } => cmd_check(&config, sources.as_deref(), &inputs),

        Commands::Explain { path } => cmd_explain(&path),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_inputs(paths: &[PathBuf]) -> Result<(Vec<Input>, Vec<Resource>)> {
    if paths.is_empty() {
        let mut original = String::new();
        std::io::stdin()
            .read_to_string(&mut original)
            .context("failed to read resources from stdin")?;
        let resources = stream::parse_stream(&original, None)?;
        return Ok((
            vec![Input {
                origin: None,
                original,
            }],
            resources,
        ));
    }

    let mut inputs = Vec::new();
    let mut resources = Vec::new();
    for path in stream::collect_inputs(paths)? {
        let original = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        resources.extend(stream::parse_stream(&original, Some(&path))?);
        inputs.push(Input {
            origin: Some(path),
            original,
        });
    }
    Ok((inputs, resources))
}

fn load_config(path: &Path) -> Result<ReplacerConfig> {
    let config = load_from_path(path)?;
    tracing::debug!(
        path = %path.display(),
        rules = config.rules.len(),
        "loaded replacement config"
    );
    Ok(config)
}

fn run_replacements(
    config: &ReplacerConfig,
    sources: Option<&Path>,
    resources: &mut [Resource],
) -> Result<()> {
    let registry = ExtenderRegistry::builtin();
    let alternate = sources.map(stream::read_file).transpose()?;
    let mut replacer = Replacer::new(&registry);
    if let Some(alternate) = &alternate {
        replacer = replacer.with_sources(alternate);
    }

    replacer.apply(resources, &config.rules).map_err(|err| {
        let kind = err.kind();
        anyhow::Error::new(err).context(format!("replacements failed ({kind})"))
    })?;
    Ok(())
}

fn cmd_apply(
    config_path: &Path,
    sources: Option<&Path>,
    in_place: bool,
    show_diff: bool,
    keep_build_annotations: bool,
    paths: &[PathBuf],
) -> Result<()> {
    if in_place && paths.is_empty() {
        bail!("--in-place needs input files, not stdin");
    }

    let config = load_config(config_path)?;
    let (inputs, mut resources) = read_inputs(paths)?;
    let before = resources.clone();
    run_replacements(&config, sources, &mut resources)?;

    if config.prune_local() {
        let pruned = stream::prune_local_config(&mut resources);
        tracing::debug!(count = pruned, "pruned local configuration");
    }
    if !keep_build_annotations {
        stream::strip_build_annotations(&mut resources);
    }

    let mut changed = 0;
    for input in &inputs {
        let origin = input.origin.as_deref();
        if !origin_changed(&before, &resources, origin) {
            continue;
        }
        changed += 1;
        let output = stream::render(
            resources
                .iter()
                .filter(|resource| resource.origin() == origin),
        )?;
        let label = input
            .origin
            .as_deref()
            .unwrap_or_else(|| Path::new("<stdin>"));
        if show_diff {
            display_diff(label, &input.original, &output);
        }
        if in_place {
            stream::write_atomic(label, output.as_bytes())?;
        }
    }

    if in_place {
        eprintln!(
            "{}",
            format!("{changed} of {} file(s) updated", inputs.len()).green()
        );
    } else {
        print!("{}", stream::render(&resources)?);
    }
    Ok(())
}

/// Whether any resource read from `origin` was modified or removed.
/// Untouched files are never re-rendered, so their comments and layout stay.
fn origin_changed(before: &[Resource], after: &[Resource], origin: Option<&Path>) -> bool {
    let from_origin = |resource: &&Resource| resource.origin() == origin;
    !before
        .iter()
        .filter(from_origin)
        .map(Resource::root)
        .eq(after.iter().filter(from_origin).map(Resource::root))
}

fn cmd_check(config_path: &Path, sources: Option<&Path>, paths: &[PathBuf]) -> Result<()> {
    let config = load_config(config_path)?;
    let (_, mut resources) = read_inputs(paths)?;
    let before = resources.clone();
    run_replacements(&config, sources, &mut resources)?;

    let mut changed = 0;
    for (old, new) in before.iter().zip(&resources) {
        if old.root() == new.root() {
            continue;
        }
        changed += 1;
        match new.origin() {
            Some(origin) => println!("{} {} ({})", "would change".yellow(), new.id(), origin.display()),
            None => println!("{} {}", "would change".yellow(), new.id()),
        }
    }

    if changed == 0 {
        println!("{}", "No resources would change".green());
    } else {
        println!("{changed} resource(s) would change");
    }
    Ok(())
}

fn cmd_explain(input: &str) -> Result<()> {
    let path = ExtendedPath::parse(input)?;
    let registry = ExtenderRegistry::builtin();

    println!("{}", "Resource path:".bold());
    for segment in path.resource_segments()? {
        println!("  {segment}");
    }

    if !path.has_extensions() {
        println!("{}", "No extensions".dimmed());
        return Ok(());
    }

    println!("{}", "Extensions:".bold());
    for (index, segment) in path.segments.iter().enumerate() {
        let inner = if segment.path.is_empty() {
            "(whole payload)".to_string()
        } else {
            segment.path.join(".")
        };
        if registry.contains(&segment.encoding) {
            println!("  #{index} {} {inner}", segment.encoding.cyan());
        } else {
            println!(
                "  #{index} {} {inner} {}",
                segment.encoding.red(),
                registry.unknown(&segment.encoding).to_string().red()
            );
        }
    }
    Ok(())
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    eprintln!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    eprintln!("{}", format!("+++ {} (replaced)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        eprint!("{}", sign);
    }
}
