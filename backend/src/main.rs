//! SheetMill CLI - Template-driven spreadsheet consolidation
//!
//! # Main Commands
//!
//! ```bash
//! sheetmill serve                                   # Start HTTP server
//! sheetmill run -c workspace.json -b january \
//!     --attach task-a=vendor_a.xlsx --attach task-b=vendor_b.csv
//! ```
//!
//! # Template Commands
//!
//! ```bash
//! sheetmill check -c workspace.json -t vendor-a input.xlsx     # Header pre-validation
//! sheetmill headers input.xlsx --sheet Data --start-row 2      # Resolved column keys
//! sheetmill suggest -c workspace.json -t vendor-a input.xlsx   # Suggested mapping
//! sheetmill validate-config workspace.json
//! ```

use clap::{Parser, Subcommand};
use sheetmill::config::{Settings, Workspace};
use sheetmill::export::XlsxWriter;
use sheetmill::models::{Severity, SourceFile, TaskStatus};
use sheetmill::parser::WorkbookAdapter;
use sheetmill::suggest::{apply_suggestions, HeaderMatchSuggester, MappingSuggester};
use sheetmill::transform::{process_batch, Definitions};
use sheetmill::validation::{capture_headers, check_headers};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sheetmill")]
#[command(about = "Map, validate and consolidate spreadsheets with saved templates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a batch and write its workbooks
    Run {
        /// Workspace configuration (schemas, templates, batches)
        #[arg(short, long)]
        config: PathBuf,

        /// Batch id
        #[arg(short, long)]
        batch: String,

        /// Attach a file to a task: <task-id>=<path> (repeatable)
        #[arg(short, long = "attach", value_parser = parse_attachment)]
        attachments: Vec<(String, PathBuf)>,

        /// Output directory (default: SHEETMILL_OUTPUT_DIR or ./exports)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the review snapshot to this file (default: stdout)
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Check a file's header row against a template
    Check {
        #[arg(short, long)]
        config: PathBuf,

        /// Template id
        #[arg(short, long)]
        template: String,

        /// Source file
        input: PathBuf,
    },

    /// Print the resolved column keys of a file
    Headers {
        /// Source file
        input: PathBuf,

        /// Sheet name (default: first sheet)
        #[arg(short, long, default_value = "")]
        sheet: String,

        /// 0-based header row
        #[arg(long, default_value = "0")]
        start_row: usize,

        /// Store the headers as expectedHeaders of this template (needs --config)
        #[arg(long, requires = "config")]
        update_template: Option<String>,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Suggest a mapping for a template from a sample file
    Suggest {
        #[arg(short, long)]
        config: PathBuf,

        /// Template id
        #[arg(short, long)]
        template: String,

        /// Sample source file
        input: PathBuf,

        /// Fill the template's unmapped fields and save the config
        #[arg(long)]
        apply: bool,
    },

    /// Validate a workspace configuration file
    ValidateConfig {
        input: PathBuf,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: SHEETMILL_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

fn parse_attachment(raw: &str) -> Result<(String, PathBuf), String> {
    let (task, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <task-id>=<path>, got '{}'", raw))?;
    if task.trim().is_empty() || path.trim().is_empty() {
        return Err(format!("expected <task-id>=<path>, got '{}'", raw));
    }
    Ok((task.trim().to_string(), PathBuf::from(path.trim())))
}

#[tokio::main]
async fn main() {
    let settings = Settings::from_env();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            batch,
            attachments,
            output,
            report,
        } => cmd_run(&settings, &config, &batch, attachments, output, report.as_deref()),

        Commands::Check {
            config,
            template,
            input,
        } => cmd_check(&config, &template, &input),

        Commands::Headers {
            input,
            sheet,
            start_row,
            update_template,
            config,
        } => cmd_headers(
            &settings,
            &input,
            &sheet,
            start_row,
            update_template.as_deref().zip(config.as_deref()),
        ),

        Commands::Suggest {
            config,
            template,
            input,
            apply,
        } => cmd_suggest(&settings, &config, &template, &input, apply),

        Commands::ValidateConfig { input } => cmd_validate_config(&input),

        Commands::Serve { port } => {
            let mut settings = settings;
            if let Some(port) = port {
                settings.port = port;
            }
            sheetmill::api::start_server(settings).await
        }
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_run(
    settings: &Settings,
    config: &Path,
    batch_id: &str,
    attachments: Vec<(String, PathBuf)>,
    output: Option<PathBuf>,
    report_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let workspace = Workspace::from_file(config)?;
    let mut batch = workspace.batch_by_id(batch_id)?.clone();
    let adapter = WorkbookAdapter;

    for (task_id, path) in attachments {
        let file = SourceFile::from_path(&path)?;
        let task = batch
            .task_mut(&task_id)
            .ok_or_else(|| format!("Task not found in batch '{}': {}", batch_id, task_id))?;

        match workspace.template(&task.template_id) {
            Some(template) => {
                for finding in task.attach_files(vec![file], template, &adapter) {
                    eprintln!(
                        "   {} {} ({}): {}",
                        severity_icon(finding.severity),
                        path.display(),
                        finding.field,
                        finding.message
                    );
                }
            }
            None => task.files.push(file),
        }
    }

    let result = process_batch(
        &mut batch,
        &workspace,
        &adapter,
        &XlsxWriter,
        &settings.run_options(),
    )?;

    let out_dir = output.unwrap_or_else(|| settings.output_dir.clone());
    for artifact in &result.artifacts {
        let path = artifact.write_to(&out_dir)?;
        eprintln!("💾 {}", path.display());
    }

    eprintln!("\n📊 Tasks:");
    for task in &result.report.tasks {
        let icon = match task.status {
            TaskStatus::Completed => "✅",
            TaskStatus::Error => "❌",
            TaskStatus::Pending | TaskStatus::Processing => "⏸️ ",
        };
        eprintln!(
            "   {} {} ({}): {} rows, {} finding(s)",
            icon,
            task.task_id,
            task.template_id,
            task.row_count,
            task.errors.len()
        );
    }

    let json = serde_json::to_string_pretty(&result.report)?;
    write_output(&json, report_path)?;

    Ok(())
}

fn cmd_check(config: &Path, template_id: &str, input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let workspace = Workspace::from_file(config)?;
    let template = workspace.template_by_id(template_id)?;
    let file = SourceFile::from_path(input)?;

    eprintln!("✔️  Checking {} against '{}'", input.display(), template.name);
    let findings = check_headers(&WorkbookAdapter, &file, template);

    if findings.is_empty() {
        eprintln!("   ✅ All headers present");
        return Ok(());
    }

    for finding in &findings {
        eprintln!(
            "   {} {}: {}",
            severity_icon(finding.severity),
            finding.field,
            finding.message
        );
    }

    if findings.iter().any(|f| f.severity == Severity::Error) {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_headers(
    settings: &Settings,
    input: &Path,
    sheet: &str,
    start_row: usize,
    update: Option<(&str, &Path)>,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = SourceFile::from_path(input)?;
    let headers = capture_headers(
        &WorkbookAdapter,
        &file,
        sheet,
        start_row,
        settings.header_scan_rows,
    )?;

    for (i, header) in headers.iter().enumerate() {
        println!("[{:2}] {}", i + 1, header);
    }

    if let Some((template_id, config)) = update {
        let mut workspace = Workspace::from_file(config)?;
        let template = workspace
            .templates
            .iter_mut()
            .find(|t| t.id == template_id)
            .ok_or_else(|| format!("Template not found: {}", template_id))?;
        template.expected_headers = headers;
        template.updated_at = chrono::Utc::now();
        workspace.save(config)?;
        eprintln!("💾 expectedHeaders of '{}' updated in {}", template_id, config.display());
    }

    Ok(())
}

fn cmd_suggest(
    settings: &Settings,
    config: &Path,
    template_id: &str,
    input: &Path,
    apply: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut workspace = Workspace::from_file(config)?;
    let (template, schema) = workspace.template_with_schema(template_id)?;
    let file = SourceFile::from_path(input)?;

    let columns = capture_headers(
        &WorkbookAdapter,
        &file,
        &template.sheet_name,
        template.start_row,
        settings.header_scan_rows,
    )?;
    let fields = schema.fields.clone();
    let suggestions = HeaderMatchSuggester::default().suggest(&fields, &columns);

    for field in &fields {
        match suggestions.get(&field.id) {
            Some(column) => println!("  {} ← {}", field.name, column),
            None => println!("  {} ← (none)", field.name),
        }
    }

    if apply {
        let template = workspace
            .templates
            .iter_mut()
            .find(|t| t.id == template_id)
            .ok_or_else(|| format!("Template not found: {}", template_id))?;
        let applied = apply_suggestions(template, &fields, &columns, &suggestions);
        workspace.save(config)?;
        eprintln!("💾 {} mapping(s) saved to {}", applied, config.display());
    }

    Ok(())
}

fn cmd_validate_config(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Validating: {}", input.display());

    let workspace = Workspace::from_file(input)?;
    let problems = workspace.dangling_references();

    eprintln!(
        "   {} schema(s), {} template(s), {} batch(es)",
        workspace.schemas.len(),
        workspace.templates.len(),
        workspace.batches.len()
    );
    if problems.is_empty() {
        eprintln!("   ✅ Configuration valid");
        Ok(())
    } else {
        Err(format!("{} dangling reference(s)", problems.len()).into())
    }
}

fn severity_icon(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "❌",
        Severity::Warning => "⚠️ ",
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Report written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
