use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use colored::Colorize;
use serde_json::{json, Value};
use strata_core::{build_core, Core, Identity as _, Inheritance as _, NodeParams};
use strata_db::{Database, DatabaseConfig, InMemoryDatabase, LoggingDatabase, Project};
use strata_store::{CommitRecord, NodeRecord, ObjectKind};
use strata_types::{NodePath, ObjectId};

use crate::cli::*;

/// Snapshot file used when neither the config nor `--snapshot` names one.
pub const DEFAULT_SNAPSHOT: &str = "strata-snapshot.json";

/// Command result, rendered as text lines or as one JSON document.
pub struct Report {
    json: Value,
    lines: Vec<String>,
}

impl Report {
    fn new(json: Value) -> Self {
        Self { json, lines: Vec::new() }
    }

    fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn print(&self, format: OutputFormat) -> anyhow::Result<()> {
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&self.json)?),
            OutputFormat::Text => {
                for line in &self.lines {
                    println!("{line}");
                }
            }
        }
        Ok(())
    }
}

pub fn load_config(cli: &Cli) -> anyhow::Result<DatabaseConfig> {
    let mut config = match &cli.config {
        Some(path) => DatabaseConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => DatabaseConfig::default(),
    };
    if let Some(snapshot) = &cli.snapshot {
        config = config.with_snapshot_path(snapshot);
    }
    if config.snapshot_path.is_none() {
        config = config.with_snapshot_path(DEFAULT_SNAPSHOT);
    }
    Ok(config)
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let db = LoggingDatabase::new(InMemoryDatabase::new(load_config(&cli)?));
    db.open().await?;
    let result = execute(&db, &cli.command).await;
    db.close().await?;
    result?.print(cli.format)
}

pub async fn execute<D: Database>(db: &D, command: &Command) -> anyhow::Result<Report> {
    match command {
        Command::Projects => cmd_projects(db).await,
        Command::DeleteProject(args) => cmd_delete_project(db, args).await,
        Command::Init(args) => cmd_init(db, args).await,
        Command::Branches(args) => with_project(db, &args.project, cmd_branches).await,
        Command::Log(args) => with_project(db, &args.project, |p| cmd_log(p, args)).await,
        Command::Dump(args) => with_project(db, &args.project, |p| cmd_dump(p, args)).await,
        Command::Node(args) => with_project(db, &args.project, |p| cmd_node(p, args)).await,
    }
}

/// Run `f` on an existing project and close the handle afterwards.
async fn with_project<D, F, Fut>(db: &D, name: &str, f: F) -> anyhow::Result<Report>
where
    D: Database,
    F: FnOnce(Arc<dyn Project>) -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<Report>>,
{
    if !db.project_names().await?.iter().any(|p| p == name) {
        bail!("no such project: {name}");
    }
    let project = db.open_project(name).await?;
    let result = f(Arc::clone(&project)).await;
    project.close().await?;
    result
}

async fn cmd_projects<D: Database>(db: &D) -> anyhow::Result<Report> {
    let names = db.project_names().await?;
    let mut report = Report::new(json!(names));
    if names.is_empty() {
        report.line("No projects.");
    }
    for name in &names {
        report.line(name.bold().to_string());
    }
    Ok(report)
}

async fn cmd_delete_project<D: Database>(
    db: &D,
    args: &DeleteProjectArgs,
) -> anyhow::Result<Report> {
    db.delete_project(&args.name).await?;
    let mut report = Report::new(json!({ "deleted": args.name }));
    report.line(format!("{} Deleted project {}", "✓".green().bold(), args.name.bold()));
    Ok(report)
}

async fn cmd_init<D: Database>(db: &D, args: &InitArgs) -> anyhow::Result<Report> {
    let project = db.open_project(&args.project).await?;
    let core = build_core(Arc::clone(&project));
    let root = core.create_node(NodeParams::root()).await?;
    let root_hash = core.persist(root).await?;
    let commit = project.make_commit(&[], root_hash, &args.message).await?;
    let result = project.set_branch_hash(&args.branch, None, commit).await;
    project.close().await?;
    result.with_context(|| format!("creating branch {}", args.branch))?;

    let mut report = Report::new(json!({
        "project": args.project,
        "branch": args.branch,
        "commit": commit,
        "root": root_hash,
    }));
    report.line(format!(
        "{} Initialized project {}",
        "✓".green().bold(),
        args.project.bold()
    ));
    report.line(format!("  Branch: {}", args.branch.yellow()));
    report.line(format!("  Commit: {}", commit.short_hex().cyan()));
    Ok(report)
}

async fn cmd_branches(project: Arc<dyn Project>) -> anyhow::Result<Report> {
    let mut heads = serde_json::Map::new();
    let mut lines = Vec::new();
    for name in project.branch_names().await? {
        let head = project.get_branch_hash(&name, None).await?;
        let short = head.hash.map(|h| h.short_hex()).unwrap_or_default();
        lines.push(format!("{} {}", name.green().bold(), short.dimmed()));
        heads.insert(name, json!(head.hash));
    }
    let mut report = Report::new(Value::Object(heads));
    if lines.is_empty() {
        report.line("No branches.");
    }
    for line in lines {
        report.line(line);
    }
    Ok(report)
}

async fn cmd_log(project: Arc<dyn Project>, args: &LogArgs) -> anyhow::Result<Report> {
    let commits = project.get_commits(None, args.limit).await?;
    let mut report = Report::new(serde_json::to_value(&commits)?);
    for commit in &commits {
        let when = chrono::DateTime::from_timestamp_millis(commit.record.time)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| commit.record.time.to_string());
        report.line(format!(
            "{}  {}  {}",
            commit.id.short_hex().yellow().bold(),
            when.dimmed(),
            commit.record.message
        ));
        if commit.record.parents.len() > 1 {
            let parents: Vec<String> = commit.record.parents.iter().map(|p| p.short_hex()).collect();
            report.line(format!("  Merge: {}", parents.join(" ")));
        }
    }
    Ok(report)
}

/// Follow one relid from the node stored at `hash`. A commit is
/// transparent: the relid is looked up in its root.
async fn child_hash(project: &dyn Project, hash: ObjectId, relid: &str) -> anyhow::Result<ObjectId> {
    let mut object = project.load_object(hash).await?;
    if object.kind == ObjectKind::Commit {
        let commit = CommitRecord::from_stored_object(&object)?;
        object = project.load_object(commit.root).await?;
    }
    let record = NodeRecord::from_stored_object(&object)?;
    record
        .children
        .get(relid)
        .copied()
        .ok_or_else(|| anyhow!("invalid path at relid {relid}"))
}

async fn cmd_dump(project: Arc<dyn Project>, args: &DumpArgs) -> anyhow::Result<Report> {
    let mut segments = args.selector.split('/');
    let prefix = segments.next().unwrap_or_default();
    let mut hash = project.find_hash(prefix).await?;
    for relid in segments.filter(|s| !s.is_empty()) {
        hash = child_hash(project.as_ref(), hash, relid).await?;
    }

    let mut entries = Vec::new();
    let mut lines = Vec::new();
    let mut stack = vec![(String::from("."), hash, 0usize)];
    while let Some((label, hash, level)) = stack.pop() {
        let object = project.load_object(hash).await?;
        let value = object.to_json()?;
        lines.push(format!(
            "{}{} {} {}",
            "  ".repeat(level),
            label.bold(),
            hash.short_hex().yellow(),
            serde_json::to_string(&value)?
        ));
        entries.push(json!({
            "label": label,
            "hash": hash,
            "kind": object.kind.to_string(),
            "depth": level,
            "data": value,
        }));
        if level >= args.depth {
            continue;
        }
        match object.kind {
            ObjectKind::Commit => {
                let commit = CommitRecord::from_stored_object(&object)?;
                stack.push(("root".into(), commit.root, level + 1));
            }
            ObjectKind::Node => {
                let record = NodeRecord::from_stored_object(&object)?;
                for (relid, child) in record.children.into_iter().rev() {
                    stack.push((relid, child, level + 1));
                }
            }
        }
    }

    let mut report = Report::new(Value::Array(entries));
    for line in lines {
        report.line(line);
    }
    Ok(report)
}

async fn cmd_node(project: Arc<dyn Project>, args: &NodeArgs) -> anyhow::Result<Report> {
    let head = project.get_branch_hash(&args.branch, None).await?;
    let Some(commit_hash) = head.hash else {
        bail!("no such branch: {}", args.branch);
    };
    let commit = project.load_commit(commit_hash).await?;
    let path: NodePath = args.path.as_deref().unwrap_or("").parse()?;

    let core = build_core(Arc::clone(&project));
    let root = core.load_root(commit.record.root).await?;
    let node = core
        .load_by_path(root, &path)
        .await?
        .ok_or_else(|| anyhow!("no node at {path}"))?;

    let guid = core.get_guid(node)?;
    let base = match core.get_base(node)? {
        Some(base) => Some(core.get_path(base)?),
        None => None,
    };
    let mut attributes = serde_json::Map::new();
    for name in core.get_attribute_names(node)? {
        if let Some(value) = core.get_attribute(node, &name)? {
            attributes.insert(name, value);
        }
    }
    let mut targets = Vec::new();
    for name in core.get_pointer_names(node)? {
        let target = core.get_pointer_path(node, &name)?;
        targets.push((name, target));
    }
    let pointers: serde_json::Map<String, Value> = targets
        .iter()
        .map(|(name, target)| (name.clone(), json!(target.as_ref().map(|p| p.to_string()))))
        .collect();
    let children = core.get_child_relids(node)?;

    let mut report = Report::new(json!({
        "path": path.to_string(),
        "commit": commit_hash,
        "guid": guid.to_string(),
        "base": base.as_ref().map(|p| p.to_string()),
        "attributes": attributes,
        "pointers": pointers,
        "children": children,
    }));
    report.line(format!("Node {} at {}", display_path(&path).bold(), commit_hash.short_hex().yellow()));
    report.line(format!("  Guid: {}", guid.to_string().cyan()));
    report.line(format!(
        "  Base: {}",
        base.as_ref().map(display_path).unwrap_or_else(|| "(none)".into())
    ));
    for (name, value) in &attributes {
        report.line(format!("  {} = {}", name.green(), value));
    }
    for (name, target) in &targets {
        let target = target.as_ref().map(display_path).unwrap_or_else(|| "null".into());
        report.line(format!("  {} -> {}", name.blue(), target));
    }
    if !children.is_empty() {
        report.line(format!("  Children: {}", children.join(", ")));
    }
    Ok(report)
}

fn display_path(path: &NodePath) -> String {
    if path.is_root() {
        "/".into()
    } else {
        path.to_string()
    }
}
