use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use java_assist::completion::{CollectingSink, CompletionEngine, Proposal};
use java_assist::index::{IndexShard, TypeEntry, WorkspaceIndex};
use java_assist::model::{DeclarationHandle, MemoryModel};
use java_assist::selection::{self, SelectionOutcome};
use java_assist::syntax::position::offset_at;
use java_assist::syntax::{SyntaxTree, TextRange};
use java_assist::{AssistConfig, EngineError, Request};

const USAGE: &str = "usage: java-assist <complete|select> <request.json>";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShardData {
    project: Arc<str>,
    #[serde(default)]
    types: Vec<TypeEntry>,
}

#[derive(Deserialize, Clone, Copy)]
struct Position {
    line: u32,
    character: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestFile {
    #[serde(default)]
    model: MemoryModel,
    /// Without shards the model itself is indexed as one project.
    #[serde(default)]
    shards: Vec<ShardData>,
    tree: SyntaxTree,
    #[serde(default)]
    project: Option<Arc<str>>,
    #[serde(default)]
    offset: Option<u32>,
    #[serde(default)]
    position: Option<Position>,
    #[serde(default)]
    range: Option<TextRange>,
    #[serde(default)]
    config: AssistConfig,
}

impl RequestFile {
    fn offset(&self) -> Result<u32> {
        if let Some(offset) = self.offset {
            return Ok(offset);
        }
        let Some(pos) = self.position else {
            bail!("request needs `offset` or `position`");
        };
        offset_at(self.tree.text(), pos.line, pos.character)
            .with_context(|| {
                format!(
                    "position {}:{} is outside the source",
                    pos.line, pos.character
                )
            })
    }

    fn index(&self) -> WorkspaceIndex {
        if self.shards.is_empty() {
            let project = self.project.clone().unwrap_or_else(|| Arc::from("workspace"));
            return WorkspaceIndex::new(vec![IndexShard::from_model(project, &self.model)]);
        }
        let shards = self
            .shards
            .iter()
            .map(|data| {
                let mut shard = IndexShard::new(Arc::clone(&data.project));
                shard.add_types(data.types.iter().cloned());
                shard
            })
            .collect();
        WorkspaceIndex::new(shards)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
enum Output {
    Completed { proposals: Vec<Proposal> },
    Selected { declarations: Vec<DeclarationHandle> },
    Cancelled,
}

fn complete(file: &RequestFile) -> Result<Output> {
    let offset = file.offset()?;
    let index = file.index();
    let mut req = Request::new(&file.model, index.snapshot(), &file.config);
    if let Some(project) = &file.project {
        req = req.with_project(Arc::clone(project));
    }
    let mut sink = CollectingSink::default();
    match CompletionEngine::new().complete(&req, &file.tree, offset, &mut sink) {
        Ok(()) => Ok(Output::Completed {
            proposals: sink.into_proposals(),
        }),
        Err(EngineError::Cancelled) => Ok(Output::Cancelled),
        Err(e) => Err(e).context("completion failed"),
    }
}

fn select(file: &RequestFile) -> Result<Output> {
    let range = match file.range {
        Some(range) => range,
        None => TextRange::empty(file.offset()?),
    };
    let index = file.index();
    let mut req = Request::new(&file.model, index.snapshot(), &file.config);
    if let Some(project) = &file.project {
        req = req.with_project(Arc::clone(project));
    }
    let outcome = selection::select(&req, &file.tree, range).context("selection failed")?;
    Ok(match outcome {
        SelectionOutcome::Resolved(declarations) => Output::Selected { declarations },
        SelectionOutcome::Cancelled => Output::Cancelled,
    })
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
        .with(
            EnvFilter::try_from_env("JAVA_ASSIST_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(command), Some(path)) = (args.next(), args.next()) else {
        bail!(USAGE);
    };

    let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let file: RequestFile =
        serde_json::from_str(&raw).with_context(|| format!("parsing request {path}"))?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        command = %command,
        path = %file.tree.path(),
        "java-assist request"
    );

    let output = match command.as_str() {
        "complete" => complete(&file)?,
        "select" => select(&file)?,
        other => bail!("unknown command `{other}`\n{USAGE}"),
    };
    serde_json::to_writer_pretty(std::io::stdout().lock(), &output).context("writing output")?;
    println!();
    Ok(())
}
