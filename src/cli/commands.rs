//! CLI command implementations
//!
//! Every command except `init` loads the configuration, opens the registry
//! over the data directory, runs, and disposes every index so the next run
//! starts from a clean shutdown.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::EngineConfig;
use crate::index::{FieldAccessors, IndexDescriptor, SearchIndex};
use crate::query::{SearchCriterion, SearchRequest, SortCriterion};
use crate::registry::IndexRegistry;
use crate::storage;

use super::args::{Cli, Command, DocumentTarget};
use super::errors::{CliError, CliResult};
use super::io::{read_document, write_error, write_response};

type Registry = IndexRegistry<Value>;

/// Parses arguments, runs the command and prints the outcome.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    let runtime = tokio::runtime::Runtime::new()?;
    match runtime.block_on(run_command(&cli.config, cli.command)) {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Runs one command, returning the JSON payload of the response
pub async fn run_command(config_path: &Path, command: Command) -> CliResult<Value> {
    if let Command::Init { data_dir } = &command {
        return init(config_path, data_dir);
    }

    let config = load_config(config_path)?;
    let registry = Registry::new(&config.data_dir, FieldAccessors::new(), config.cache.clone());
    registry.load_all().await?;
    debug!(indices = registry.list_index_ids().len(), "registry opened");

    let outcome = dispatch(&registry, command).await;
    registry.dispose_all().await?;
    outcome
}

async fn dispatch(registry: &Registry, command: Command) -> CliResult<Value> {
    match command {
        Command::Init { .. } => Err(CliError::already_initialized()),
        Command::Create {
            index,
            name,
            fields,
            text_fields,
            max_items,
        } => {
            let mut descriptor = IndexDescriptor::new(index, registry.root())
                .with_fields(fields)
                .with_text_fields(text_fields)
                .with_max_items(max_items);
            if let Some(name) = name {
                descriptor = descriptor.with_name(name);
            }
            let created = registry.create_index(descriptor).await?;
            Ok(serde_json::to_value(created.descriptor())?)
        }
        Command::List => Ok(json!(registry.list_index_ids())),
        Command::Add { target, file } => {
            let document = read_document(&file)?;
            open(registry, &target.index)?.add(&target.id, document).await?;
            Ok(json!({ "id": target.id }))
        }
        Command::Update { target, file } => {
            let document = read_document(&file)?;
            open(registry, &target.index)?
                .update(&target.id, document)
                .await?;
            Ok(json!({ "id": target.id }))
        }
        Command::Get { target } => get(registry, &target).await,
        Command::Remove { target } => {
            open(registry, &target.index)?.remove(&target.id).await?;
            Ok(json!({ "id": target.id }))
        }
        Command::Search {
            indices,
            criteria,
            sort,
            text,
            page,
            size,
        } => {
            let request = build_request(&criteria, &sort, text, page, size)?;
            search(registry, &indices, &request).await
        }
        Command::Rebuild { index } => {
            let target = open(registry, &index)?;
            target.rebuild().await?;
            Ok(serde_json::to_value(target.get_statistics())?)
        }
        Command::Stats { index } => {
            Ok(serde_json::to_value(open(registry, &index)?.get_statistics())?)
        }
        Command::Drop { index } => drop_index(registry, &index).await,
    }
}

/// Writes a default configuration and creates the data directory
pub fn init(config_path: &Path, data_dir: &Path) -> CliResult<Value> {
    if config_path.exists() {
        return Err(CliError::already_initialized());
    }
    std::fs::create_dir_all(data_dir)?;

    let config = EngineConfig::default_for(data_dir);
    config
        .save(config_path)
        .map_err(|e| CliError::config_error(e.to_string()))?;
    info!(config = %config_path.display(), data_dir = %data_dir.display(), "initialized");
    Ok(serde_json::to_value(&config)?)
}

fn load_config(path: &Path) -> CliResult<EngineConfig> {
    if !path.exists() {
        return Err(CliError::not_initialized());
    }
    EngineConfig::load(path).map_err(|e| CliError::config_error(e.to_string()))
}

fn open(registry: &Registry, id: &str) -> CliResult<Arc<SearchIndex<Value>>> {
    registry
        .get_index(id)?
        .ok_or_else(|| CliError::unknown_index(id))
}

async fn get(registry: &Registry, target: &DocumentTarget) -> CliResult<Value> {
    let document = open(registry, &target.index)?.get(&target.id).await?;
    Ok(json!({ "id": target.id, "document": document }))
}

/// Builds a request from `field:op:value` and `field[:dir]` strings
pub fn build_request(
    criteria: &[String],
    sort: &[String],
    text: Option<String>,
    page: usize,
    size: usize,
) -> CliResult<SearchRequest> {
    let mut request = SearchRequest::new().page(page, size);
    for raw in criteria {
        let criterion: SearchCriterion = raw
            .parse()
            .map_err(|e: crate::index::IndexError| CliError::invalid_argument(e.to_string()))?;
        request = request.filter(criterion);
    }
    for (priority, raw) in sort.iter().enumerate() {
        let criterion: SortCriterion = raw
            .parse()
            .map_err(|e: crate::index::IndexError| CliError::invalid_argument(e.to_string()))?;
        request = request.sort_by(criterion.with_priority(priority as i32));
    }
    if let Some(text) = text {
        request = request.text(text);
    }
    request
        .validate()
        .map_err(|e| CliError::invalid_argument(e.to_string()))?;
    Ok(request)
}

async fn search(registry: &Registry, indices: &[String], request: &SearchRequest) -> CliResult<Value> {
    let result = match indices {
        [single] => open(registry, single)?.search(request).await,
        _ => {
            for id in indices {
                open(registry, id)?;
            }
            registry.search_multiple(indices, request).await
        }
    };
    if !result.success {
        let message = result.error.unwrap_or_else(|| "search failed".to_string());
        return Err(crate::index::IndexError::Search(message).into());
    }
    Ok(serde_json::to_value(&result)?)
}

async fn drop_index(registry: &Registry, id: &str) -> CliResult<Value> {
    let index = open(registry, id)?;
    index.clear().await?;
    let dir = index.dir().to_path_buf();
    drop(index);

    registry.remove_index(id).await?;
    storage::remove_dir_if_exists(&dir).await?;
    info!(index_id = id, "index dropped");
    Ok(json!({ "dropped": id }))
}
