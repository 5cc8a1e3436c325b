use crate::{
    cli::args::{NotifyArgs, RunArgs, SweepArgs},
    core::{
        batch::{self, BatchDescriptor, BatchExecutor, DescriptorRewriter},
        config::{ConfigLoader, ConfigValidator, QmConfig},
        error::QmError,
        notification::{
            credentials::provider_from_config, AuthorDirectory, CredentialProvider,
            MessageTemplate, Notifier, SmtpMailer,
        },
        orchestrator::{Layout, RunCoordinator, SweepReport},
        publisher::CouchDbPublisher,
        results_processor::{GdxDumpDecoder, ResultExtractor},
        tool_executor::ToolExecutor,
        types::RevisionRequest,
        workspace::{resolve_program, SvnWorkspace},
    },
    Result,
};
use std::path::Path;
use std::sync::Arc;

/// Load qm.toml (or the `--config` file) and validate it.
///
/// `notify` decides whether this command sends mail, which is what the
/// notification section is validated against.
pub fn load_config(
    root: &Path,
    config_file: Option<&Path>,
    notify: impl FnOnce(&QmConfig) -> bool,
) -> Result<QmConfig, QmError> {
    let mut config = match config_file {
        Some(path) => ConfigLoader::load_from_path(path)?,
        None => ConfigLoader::load_from_root(root)?,
    };
    config.notification.enabled = notify(&config);
    ConfigValidator::validate(&config)?;
    Ok(config)
}

fn workspace(root: &Path, config: &QmConfig, tools: &ToolExecutor) -> SvnWorkspace {
    SvnWorkspace::new(
        root,
        &config.svn.program,
        config.svn.timeout(),
        tools.clone(),
    )
}

/// Wire the production collaborators for `root`.
pub fn build_coordinator(
    root: &Path,
    config: &QmConfig,
    tools: &ToolExecutor,
) -> Result<RunCoordinator, QmError> {
    let gui_dir = config.paths.gui_dir(root);
    let layout = Layout {
        results_dir: config.paths.results_dir(root),
        archive_root: config.paths.archive_root(root),
    };
    let rewriter = DescriptorRewriter::new(
        config.paths.temp_output_dir()?,
        &config.solver.unavailable_backend,
        &config.solver.substitute_backend,
    );
    let executor = BatchExecutor::new(&gui_dir, &config.solver, tools.clone());
    let decoder = GdxDumpDecoder::new(
        resolve_program(root, &config.extraction.dump_program),
        tools.clone(),
    );
    let publisher = CouchDbPublisher::new(&config.store.url, config.store.timeout())?;
    let extractor = ResultExtractor::new(
        layout.results_dir.clone(),
        config.extraction.clone(),
        Arc::new(decoder),
        Arc::new(publisher),
    );

    Ok(RunCoordinator::new(
        layout,
        workspace(root, config, tools),
        rewriter,
        executor,
        extractor,
    ))
}

/// Builds the notifier after making sure the mail login can be read.
pub fn build_notifier(
    root: &Path,
    config: &QmConfig,
    tools: &ToolExecutor,
) -> Result<Notifier, QmError> {
    let notification = &config.notification;
    let credentials: Arc<dyn CredentialProvider> =
        provider_from_config(&notification.credentials, root);
    credentials.credentials()?;

    let directory = AuthorDirectory::new(&notification.authors, &notification.fallback_author)?;
    let transport = SmtpMailer::new(
        &notification.smtp_host,
        notification.smtp_port,
        notification.timeout(),
    );
    Ok(Notifier::new(
        workspace(root, config, tools),
        directory,
        MessageTemplate::from_config(notification),
        credentials,
        Arc::new(transport),
    ))
}

fn discover_batches(root: &Path, config: &QmConfig) -> Result<Vec<BatchDescriptor>, QmError> {
    batch::discover(
        &config.paths.gui_dir(root),
        &config.paths.batch_pattern,
        &config.paths.excluded_batches,
    )
}

fn print_report(report: &SweepReport) {
    println!("Revision {} ({} batches)", report.revision, report.runs.len());
    for run in &report.runs {
        println!("  {:<40} {}", run.key.batch_name, run.status_line());
    }
    let elapsed = (report.finished_at - report.started_at)
        .to_std()
        .unwrap_or_default();
    println!(
        "Finished in {}, {} with failures",
        humantime::format_duration(std::time::Duration::from_secs(elapsed.as_secs())),
        report.failed()
    );
}

pub async fn sweep(root: &Path, config_file: Option<&Path>, args: SweepArgs) -> Result<i32> {
    let config = load_config(root, config_file, |config| {
        config.notification.enabled && !args.no_notify
    })?;
    let tools = ToolExecutor::tokio();

    let notifier = if config.notification.enabled {
        Some(build_notifier(root, &config, &tools)?)
    } else {
        tracing::info!("notification disabled for this sweep");
        None
    };

    let batches = discover_batches(root, &config)?;
    tracing::info!(count = batches.len(), "discovered batch descriptors");

    let request = args
        .revision
        .map(RevisionRequest::Exact)
        .unwrap_or(RevisionRequest::Head);
    let coordinator = build_coordinator(root, &config, &tools)?;
    let report = coordinator.run_sweep(request, &batches).await?;
    print_report(&report);

    let mut exit_code = report.exit_code();
    if let Some(notifier) = notifier {
        if let Err(error) = notifier.notify(report.revision, Some(&report)).await {
            tracing::error!(code = error.code(), "failed to send notification: {}", error);
            if error.is_fatal() {
                return Err(error.into());
            }
            exit_code = exit_code.max(1);
        }
    }
    Ok(exit_code)
}

pub async fn run(root: &Path, config_file: Option<&Path>, args: RunArgs) -> Result<i32> {
    let config = load_config(root, config_file, |_| false)?;
    let tools = ToolExecutor::tokio();

    let descriptor = batch::find(
        &config.paths.gui_dir(root),
        &config.paths.batch_pattern,
        &args.batch,
    )?;
    let request = args
        .revision
        .map(RevisionRequest::Exact)
        .unwrap_or(RevisionRequest::Head);

    let coordinator = build_coordinator(root, &config, &tools)?;
    let report = coordinator
        .run_sweep(request, std::slice::from_ref(&descriptor))
        .await?;
    print_report(&report);
    Ok(report.exit_code())
}

pub async fn notify(root: &Path, config_file: Option<&Path>, args: NotifyArgs) -> Result<i32> {
    let config = load_config(root, config_file, |_| true)?;
    let tools = ToolExecutor::tokio();

    let notifier = build_notifier(root, &config, &tools)?;
    notifier.notify(args.revision, None).await?;
    println!("Notification for revision {} sent", args.revision);
    Ok(0)
}

pub fn batches(root: &Path, config_file: Option<&Path>) -> Result<i32> {
    let config = load_config(root, config_file, |_| false)?;
    for descriptor in discover_batches(root, &config)? {
        println!("{}\t{}", descriptor.name, descriptor.path.display());
    }
    Ok(0)
}
