use clap::{Parser, Subcommand};
use dirdb::export::{self, ExportOptions, ExportReport, TableInfo};
use dirdb::{build, manifest, sync, target, BatchSummary, BuildReport};
use std::path::{Path, PathBuf};
use std::process;

/// dirdb CLI — build SQLite databases from data directories and export
/// them back
#[derive(Parser)]
#[command(name = "dirdb", version, about)]
struct Cli {
    /// Root directory containing the target data directories
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Directory where built database files are written
    #[arg(long, default_value = "build")]
    build_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build database files from target directories
    Build {
        /// Target names to build (see --list)
        targets: Vec<String>,

        /// Build every discoverable target
        #[arg(long, short)]
        all: bool,

        /// List available targets and exit
        #[arg(long, short)]
        list: bool,
    },

    /// Export built databases back to the directory layout
    Export {
        /// Database names in the build directory to export
        databases: Vec<String>,

        /// Export every database file in the build directory
        #[arg(long, short)]
        all: bool,

        /// List database files in the build directory and exit
        #[arg(long, short)]
        list: bool,

        /// Export one specific database file
        #[arg(long, short)]
        file: Option<PathBuf>,

        /// Output directory (default: alongside the database file)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Also write a JSON array per data table
        #[arg(long)]
        json: bool,

        /// Skip CSV output
        #[arg(long)]
        no_csv: bool,

        /// Print per-table row and column details
        #[arg(long, short)]
        info: bool,
    },

    /// Export every built database into its data directory, keeping
    /// hand-authored files
    Sync,

    /// Generate tables.config manifests from the files present
    GenConfig {
        /// Target names to process
        targets: Vec<String>,

        /// Process every discoverable target
        #[arg(long, short)]
        all: bool,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Build { targets, all, list } => {
            run_build(&cli.data_dir, &cli.build_dir, targets, all, list)
        }
        Command::Export {
            databases,
            all,
            list,
            file,
            output,
            json,
            no_csv,
            info,
        } => {
            let opts = ExportOptions {
                csv: !no_csv,
                json,
            };
            run_export(
                &cli.build_dir,
                databases,
                all,
                list,
                file,
                output,
                &opts,
                info,
            )
        }
        Command::Sync => {
            let (reports, summary) = sync::sync_build_dir(&cli.build_dir, &cli.data_dir)?;
            for report in &reports {
                print_export_report(report);
            }
            print_summary("synced", &summary);
            Ok(())
        }
        Command::GenConfig { targets, all } => run_gen_config(&cli.data_dir, targets, all),
    }
}

fn run_build(
    data_dir: &Path,
    build_dir: &Path,
    targets: Vec<String>,
    all: bool,
    list: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let available = target::discover_targets(data_dir)?;

    if list {
        println!("Available targets:");
        for target in &available {
            println!("  {}", target.name);
        }
        return Ok(());
    }

    if all {
        let (reports, summary) = build::build_all(data_dir, build_dir)?;
        for report in &reports {
            print_build_report(report);
        }
        print_summary("built", &summary);
        return Ok(());
    }

    if targets.is_empty() {
        return Err("no targets given; use --all or name targets (see --list)".into());
    }
    let known: Vec<&str> = available.iter().map(|t| t.name.as_str()).collect();
    let unknown: Vec<&str> = targets
        .iter()
        .map(String::as_str)
        .filter(|name| !known.contains(name))
        .collect();
    if !unknown.is_empty() {
        return Err(format!(
            "unknown targets: {}; available: {}",
            unknown.join(", "),
            known.join(", ")
        )
        .into());
    }

    let mut summary = BatchSummary::default();
    for name in &targets {
        let target = target::find_target(data_dir, name)?;
        if let Some(report) = summary.record(name, build::build_target(&target, build_dir)) {
            print_build_report(&report);
        }
    }
    print_summary("built", &summary);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_export(
    build_dir: &Path,
    databases: Vec<String>,
    all: bool,
    list: bool,
    file: Option<PathBuf>,
    output: Option<PathBuf>,
    opts: &ExportOptions,
    info: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(db_path) = file {
        if info {
            print_database_info(&db_path)?;
        }
        let report = export::export_database(&db_path, output.as_deref(), opts)?;
        print_export_report(&report);
        return Ok(());
    }

    let available = export::discover_databases(build_dir)?;

    if list {
        println!("Database files in {}:", build_dir.display());
        for path in &available {
            let size = std::fs::metadata(path)?.len();
            println!(
                "  {} ({:.2} KB)",
                path.file_stem().unwrap_or_default().to_string_lossy(),
                size as f64 / 1024.0
            );
        }
        return Ok(());
    }

    let export_root = output.unwrap_or_else(|| build_dir.join("export"));

    if all {
        if info {
            for path in &available {
                print_database_info(path)?;
            }
        }
        let (reports, summary) = export::export_all(build_dir, &export_root, opts)?;
        for report in &reports {
            print_export_report(report);
        }
        print_summary("exported", &summary);
        return Ok(());
    }

    if databases.is_empty() {
        return Err("no databases given; use --all, --file, or name databases (see --list)".into());
    }
    let known: Vec<String> = available
        .iter()
        .map(|p| p.file_stem().unwrap_or_default().to_string_lossy().to_string())
        .collect();
    let unknown: Vec<&str> = databases
        .iter()
        .map(String::as_str)
        .filter(|name| !known.iter().any(|k| k == name))
        .collect();
    if !unknown.is_empty() {
        return Err(format!(
            "database files not found: {}; available: {}",
            unknown.join(", "),
            known.join(", ")
        )
        .into());
    }

    let mut summary = BatchSummary::default();
    for name in &databases {
        let db_path = build_dir.join(format!("{name}.{}", build::DB_EXTENSION));
        if info {
            print_database_info(&db_path)?;
        }
        let out = export_root.join(name);
        let result = export::export_database(&db_path, Some(&out), opts);
        if let Some(report) = summary.record(name, result) {
            print_export_report(&report);
        }
    }
    print_summary("exported", &summary);
    Ok(())
}

fn run_gen_config(
    data_dir: &Path,
    targets: Vec<String>,
    all: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let selected: Vec<target::Target> = if all {
        target::discover_targets(data_dir)?
    } else if targets.is_empty() {
        return Err("no targets given; use --all or name targets".into());
    } else {
        targets
            .iter()
            .map(|name| target::find_target(data_dir, name))
            .collect::<dirdb::Result<_>>()?
    };

    for target in &selected {
        let generated = manifest::generate_manifests(&target.dir)?;
        match (generated.data_tables, generated.file_tables) {
            (None, None) => println!("{}: nothing to declare", target.name),
            (tables, files) => {
                if let Some(count) = tables {
                    println!("{}: wrote tables/tables.config ({count} tables)", target.name);
                }
                if let Some(count) = files {
                    println!("{}: wrote files/tables.config ({count} file-tables)", target.name);
                }
            }
        }
    }
    Ok(())
}

fn print_build_report(report: &BuildReport) {
    println!(
        "{}: {} -> {} data table(s), {} file-table(s), {} config key(s), {} script(s)",
        report.target,
        report.db_path.display(),
        report.data_tables.len(),
        report.file_tables.len(),
        report.config_keys,
        report.scripts_run,
    );
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
}

fn print_export_report(report: &ExportReport) {
    println!("{} -> {}", report.database, report.output_dir.display());
    for (table, rows) in &report.data_tables {
        println!("  {table}: {rows} row(s)");
    }
    for (table, files) in &report.file_tables {
        println!("  {table}: {files} file(s)");
    }
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
}

fn print_database_info(db_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}:", db_path.display());
    for info in export::database_info(db_path)? {
        print_table_info(&info);
    }
    Ok(())
}

fn print_table_info(info: &TableInfo) {
    println!("  {} ({} rows)", info.name, info.rows);
    for (name, decl, pk) in &info.columns {
        let pk = if *pk { " PRIMARY KEY" } else { "" };
        println!("    {name}: {decl}{pk}");
    }
}

fn print_summary(verb: &str, summary: &BatchSummary) {
    println!(
        "{}/{} {verb} successfully",
        summary.succeeded.len(),
        summary.total()
    );
    for (name, error) in &summary.failed {
        println!("  failed {name}: {error}");
    }
}
