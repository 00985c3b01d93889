//! `assocload run | validate | stage`: config-driven association loads.

use std::fs::File;
use std::path::{Path, PathBuf};

use assocload_io::{
    annotate_files, load_aux_cache, open_source, output_dir, write_candidates, CsvSink, IoError,
    SinkSettings,
};
use assocload_recon::config::RowSource;
use assocload_recon::{run, MemorySink, ReconConfig, ReconError, ReconResult};
use tracing::info;

use crate::exit_codes::{recon_exit_code, recon_hint, EXIT_INVALID_CONFIG, EXIT_IO};
use crate::CliError;

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        CliError {
            code: recon_exit_code(&err),
            hint: recon_hint(&err).map(String::from),
            message: err.to_string(),
        }
    }
}

impl From<IoError> for CliError {
    fn from(err: IoError) -> Self {
        ReconError::from(err).into()
    }
}

fn load_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| CliError {
        code: EXIT_IO,
        message: format!("cannot read config {}: {e}", config_path.display()),
        hint: None,
    })?;
    Ok(ReconConfig::from_toml(&config_str)?)
}

/// Directory that relative paths in the config are resolved against.
fn base_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or_else(|| Path::new("."))
}

pub fn cmd_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    dry_run: bool,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let base = base_dir(&config_path);

    let cache = load_aux_cache(&config, base)?;
    let source = open_source(&config, base)?;

    let result: ReconResult = if dry_run {
        let (result, sink) = run(&config, source, cache, MemorySink::new())?;
        info!(
            associations = sink.associations.len(),
            aux_links = sink.aux_links.len(),
            reports = sink.reports.len(),
            "dry run: output discarded"
        );
        result
    } else {
        let sink = CsvSink::new(output_dir(&config, base), SinkSettings::for_config(&config));
        let (result, sink) = run(&config, source, cache, sink)?;
        eprintln!("wrote {}", sink.dir().display());
        result
    };

    let json_str = serde_json::to_string_pretty(&result).map_err(|e| CliError {
        code: crate::exit_codes::EXIT_ERROR,
        message: format!("JSON serialization error: {e}"),
        hint: None,
    })?;

    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str).map_err(|e| CliError {
            code: EXIT_IO,
            message: format!("cannot write {}: {e}", path.display()),
            hint: None,
        })?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    // Human summary to stderr
    let s = &result.summary;
    eprintln!(
        "{} units: {} existing, {} skipped, {} associated, {} reported, {} aux links",
        s.units, s.existing, s.skipped, s.associated, s.reported, s.aux_links,
    );
    if !s.subject_codes.is_empty() {
        eprintln!("subject discrepancies: {}", histogram(&s.subject_codes));
    }
    if !s.candidate_codes.is_empty() {
        eprintln!("candidate discrepancies: {}", histogram(&s.candidate_codes));
    }
    if dry_run {
        eprintln!("dry run: nothing written");
    }

    Ok(())
}

fn histogram(codes: &std::collections::BTreeMap<String, usize>) -> String {
    codes
        .iter()
        .map(|(code, n)| format!("{code}={n}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let policy = config.namespace_policy()?;
    let source = match config.files.row_source()? {
        RowSource::Candidates(_) => "staged candidates",
        RowSource::Provider { .. } => "provider + registry",
    };
    eprintln!(
        "valid: load '{}' ({}) with {} namespace(s), {} single, {} multiple, from {}",
        config.name,
        config.job_stream,
        config.namespaces.len(),
        policy.single().len(),
        policy.multiple().len(),
        source,
    );

    let names = |keys: &std::collections::BTreeSet<i64>| {
        keys.iter()
            .map(|k| format!("{} ({k})", config.namespace_name(*k).unwrap_or("?")))
            .collect::<Vec<_>>()
            .join(", ")
    };
    eprintln!("single:   {}", names(policy.single()));
    eprintln!("multiple: {}", names(policy.multiple()));
    Ok(())
}

pub fn cmd_stage(config_path: PathBuf, output: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let base = base_dir(&config_path);

    let RowSource::Provider { provider, registry } = config.files.row_source()? else {
        return Err(CliError {
            code: EXIT_INVALID_CONFIG,
            message: "stage needs `provider` and `registry` in [files]".into(),
            hint: Some("this config already reads staged candidates".into()),
        });
    };

    let rows = annotate_files(
        &config,
        &assocload_io::source::resolve(base, provider),
        &assocload_io::source::resolve(base, registry),
    )?;

    let file = File::create(&output).map_err(|e| CliError {
        code: EXIT_IO,
        message: format!("cannot write {}: {e}", output.display()),
        hint: None,
    })?;
    write_candidates(file, &rows)?;
    eprintln!("staged {} candidate rows to {}", rows.len(), output.display());
    Ok(())
}
