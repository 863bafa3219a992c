mod cli;

use subkeeper::{
    config, fingerprint, normalize,
    pipeline::{self, RunContext, RunOptions},
};
use subkeeper_av::{ContainerEditor, RemoveReason, ToolRegistry, TrackDisposition};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "subkeeper=trace,subkeeper_av=trace,subkeeper_common=debug".to_string()
        } else {
            "subkeeper=info,subkeeper_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            root,
            dry_run,
            no_download,
            no_extract,
            import,
        } => {
            let options = RunOptions {
                dry_run,
                download: !no_download,
                extract: !no_extract,
            };
            run_pipeline(&root, cli.config.as_deref(), options, import.as_deref())
        }
        Commands::Tracks { file } => show_tracks(&file, cli.config.as_deref()),
        Commands::Hash { file } => hash_file(&file),
        Commands::Normalize { dir } => normalize_dir(&dir, cli.config.as_deref()),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("subkeeper {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_pipeline(
    root: &Path,
    config_path: Option<&Path>,
    options: RunOptions,
    import: Option<&str>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !root.exists() {
        anyhow::bail!("Path does not exist: {:?}", root);
    }

    let arr = match import {
        Some(name) => Some(
            config
                .arr(name)
                .cloned()
                .with_context(|| format!("No enabled arr named '{}' in config", name))?,
        ),
        None => None,
    };

    let rt = tokio::runtime::Runtime::new()?;
    let summary = rt.block_on(async {
        let mut ctx = RunContext::from_config(&config, options)?;
        let mut summary = ctx.run(root).await;

        if let Some(arr) = &arr {
            if options.dry_run {
                println!("[DRY RUN] Would ask {} to import {:?}", arr.name, root);
            } else {
                summary.import = Some(pipeline::import_into(arr, root).await);
            }
        }
        anyhow::Ok(summary)
    })?;

    println!("{}", summary);

    if summary.is_fatal() {
        anyhow::bail!("OpenSubtitles authentication failed");
    }
    Ok(())
}

fn show_tracks(file: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let editor = ContainerEditor::system(ToolRegistry::discover(&config.tools));
    let ctx = RunContext::new(&config, editor.clone(), None, RunOptions::default())?;

    let rt = tokio::runtime::Runtime::new()?;
    let info = rt.block_on(editor.identify(file))?;
    let classification = ctx.classifier().classify(file, &info.tracks);

    println!("File: {}", file.display());
    println!("Container: {}", info.format.as_deref().unwrap_or("unknown"));
    println!("Attachments: {}", info.attachments.len());

    println!("\nSubtitle Tracks: {}", info.subtitle_tracks().count());
    for track in info.subtitle_tracks() {
        print!("  [{}] {}", track.id, track.codec);
        if let Some(lang) = track.language() {
            print!(" ({})", lang);
        }
        if let Some(name) = track.name() {
            print!(" \"{}\"", name);
        }
        match classification.disposition(track.id) {
            Some(TrackDisposition::Extract { output }) => {
                print!(" -> extract to {}", output.display())
            }
            Some(TrackDisposition::Remove(reason)) => print!(" -> remove ({})", describe(reason)),
            Some(TrackDisposition::Ignore) | None => {}
        }
        println!();
    }

    Ok(())
}

fn describe(reason: &RemoveReason) -> String {
    match reason {
        RemoveReason::NotText => "not a text subtitle".to_string(),
        RemoveReason::NameMatched(pattern) => format!("name matches '{}'", pattern),
        RemoveReason::UnwantedLanguage => "unwanted language".to_string(),
    }
}

fn hash_file(file: &Path) -> Result<()> {
    let hash = fingerprint::fingerprint(file)
        .with_context(|| format!("Cannot fingerprint {:?}", file))?;
    println!("{}", hash);
    Ok(())
}

fn normalize_dir(dir: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !dir.is_dir() {
        anyhow::bail!("Not a directory: {:?}", dir);
    }

    let report = normalize::normalize_directory(dir, &config.language_map()?)?;
    println!("Renamed {} file(s)", report.renamed);
    if report.collisions > 0 {
        println!("Skipped {} rename(s) onto existing files", report.collisions);
    }
    if report.unknown_codes > 0 {
        println!(
            "{} file(s) have a 3-letter code missing from [language_codes]",
            report.unknown_codes
        );
    }
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install mkvtoolnix to extract and strip tracks.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::read_config(p)?;
            let report = config::validate(&config);

            for warning in &report.warnings {
                println!("  warning: {}", warning);
            }
            for error in &report.errors {
                println!("  error: {}", error);
            }
            if !report.is_ok() {
                anyhow::bail!("{} configuration error(s)", report.errors.len());
            }

            println!("✓ Configuration is valid");
            println!("  Languages: {}", config.wanted_languages().join(", "));
            println!(
                "  Track name patterns: {}",
                config.subtitles.remove_track_patterns.len()
            );
            println!(
                "  OpenSubtitles: {}",
                if config.opensubtitles.is_complete() {
                    "configured"
                } else {
                    "not configured"
                }
            );
            println!("  Arr integrations: {}", config.arrs.len());
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Languages: {}", config.wanted_languages().join(", "));
        }
    }

    Ok(())
}
