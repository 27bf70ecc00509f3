//! Two-phase corpus build.
//!
//! Phase 1 loads, parses and extracts every document in parallel, then
//! merges their registry contributions on one thread and freezes the
//! registry. Phase 2 resolves and renders every document in parallel against
//! the frozen registry. Nothing in phase 2 starts before phase 1 has
//! finished for the whole corpus.

use crate::classify::Classifier;
use crate::config::Config;
use crate::diagnostics::{Diagnostic, Report};
use crate::extract;
use crate::loader;
use crate::model::ExtractedDocument;
use crate::parser;
use crate::registry::{self, RegistryBuilder};
use crate::render::{self, Page, PageSummary, Renderer, SiteIndex};
use crate::resolve;
use crate::search::{self, SearchEntry};
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const SEARCH_INDEX_FILE: &str = "search-index.json";
pub const DIAGNOSTICS_FILE: &str = "diagnostics.json";

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub source: PathBuf,
    pub output: PathBuf,
    pub config: Option<PathBuf>,
    pub format: String,
    /// Worker threads; rayon's default pool when `None`.
    pub jobs: Option<usize>,
}

#[derive(Debug)]
pub struct BuildSummary {
    pub pages: usize,
    pub documentables: usize,
    pub report: Report,
}

/// Build the site described by `opts`. Only configuration problems, a
/// missing source root or an unwritable output are errors; everything else
/// ends up in the diagnostics report.
pub fn run(opts: &BuildOptions) -> Result<BuildSummary> {
    let config = Config::load(&opts.source, opts.config.as_deref())?;
    let classifier = Classifier::new(&config)?;
    let renderer = render::create_renderer(&opts.format)?;

    match opts.jobs {
        Some(jobs) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(jobs)
                .build()
                .context("failed to start worker pool")?;
            pool.install(|| build(opts, &config, &classifier, renderer.as_ref()))
        }
        None => build(opts, &config, &classifier, renderer.as_ref()),
    }
}

fn build(
    opts: &BuildOptions,
    config: &Config,
    classifier: &Classifier,
    renderer: &dyn Renderer,
) -> Result<BuildSummary> {
    let files = loader::discover(&opts.source, &config.extensions)?;
    fs::create_dir_all(&opts.output).with_context(|| {
        format!("failed to create output directory: {}", opts.output.display())
    })?;

    // Phase 1: parse + extract
    tracing::info!(files = files.len(), "parsing and extracting");
    let loaded: Vec<Result<ExtractedDocument, Diagnostic>> = files
        .par_iter()
        .map(|path| {
            let source = loader::load(&opts.source, path)?;
            let parsed = parser::parse(&source.text);
            Ok(extract::extract(source, parsed, config, classifier))
        })
        .collect();

    let mut diagnostics = Vec::new();
    let mut docs = Vec::with_capacity(loaded.len());
    for result in loaded {
        match result {
            Ok(doc) => docs.push(doc),
            Err(diag) => diagnostics.push(diag),
        }
    }
    docs.sort_by(|a, b| a.source.path.cmp(&b.source.path));
    assign_unique_pages(&mut docs, &mut diagnostics);

    for doc in &docs {
        diagnostics.extend(
            doc.parsed
                .errors
                .iter()
                .map(|e| Diagnostic::parse(&doc.source.path, e)),
        );
        diagnostics.extend(doc.warnings.iter().cloned());
    }

    let contributions: Vec<Vec<registry::Entry>> =
        docs.par_iter().map(registry::contribution).collect();
    let mut builder = RegistryBuilder::default();
    for contribution in contributions {
        builder.extend(contribution);
    }
    let registry = builder.freeze();

    // Phase 2: resolve + render against the frozen registry
    tracing::info!(
        documents = docs.len(),
        documentables = registry.len(),
        "registry frozen, resolving and rendering"
    );
    let ext = renderer.file_extension();
    let rendered: Vec<Result<(Vec<Diagnostic>, Vec<SearchEntry>)>> = docs
        .par_iter()
        .map(|doc| {
            let (resolutions, found) = resolve::resolve(doc, &registry, config);
            let body = renderer.render(&Page {
                doc,
                resolutions: &resolutions,
                registry: &registry,
                site_title: &config.title,
            });
            write_output(&opts.output, &format!("{}.{}", doc.page, ext), &body)?;
            Ok((found, search::fragment(doc, ext)))
        })
        .collect();

    let mut fragments = Vec::with_capacity(rendered.len());
    for result in rendered {
        let (found, fragment) = result?;
        diagnostics.extend(found);
        fragments.push(fragment);
    }

    let summaries = page_summaries(&docs);
    let index = renderer.render_index(&SiteIndex {
        title: &config.title,
        pages: &summaries,
    });
    write_output(&opts.output, &format!("index.{}", ext), &index)?;
    write_json(&opts.output, SEARCH_INDEX_FILE, &search::merge(fragments))?;

    let report = Report::new(diagnostics);
    for file in &report.files {
        for issue in &file.issues {
            tracing::warn!("{}", issue);
        }
    }
    write_json(&opts.output, DIAGNOSTICS_FILE, &report)?;

    Ok(BuildSummary {
        pages: docs.len(),
        documentables: registry.len(),
        report,
    })
}

/// Give every document a distinct page path. Comparison ignores case so the
/// output also works on case-insensitive filesystems; later documents get a
/// numeric suffix.
fn assign_unique_pages(docs: &mut [ExtractedDocument], diagnostics: &mut Vec<Diagnostic>) {
    let mut used: HashSet<String> = HashSet::from(["index".to_string()]);
    for doc in docs.iter_mut() {
        if used.insert(doc.page.to_lowercase()) {
            continue;
        }
        let mut n = 2;
        let page = loop {
            let candidate = format!("{}-{}", doc.page, n);
            if used.insert(candidate.to_lowercase()) {
                break candidate;
            }
            n += 1;
        };
        diagnostics.push(Diagnostic::Extraction {
            path: doc.source.path.clone(),
            line: 1,
            title: doc.root().title.clone(),
            message: format!("page '{}' already taken, writing '{}'", doc.page, page),
        });
        doc.page = page;
    }
}

fn page_summaries(docs: &[ExtractedDocument]) -> Vec<PageSummary> {
    let mut summaries: Vec<PageSummary> = docs
        .iter()
        .map(|doc| PageSummary {
            page: doc.page.clone(),
            title: doc.root().title.clone(),
            kind: doc.root().kind,
            subkind: doc.parsed.meta.subkind.clone(),
            category: doc
                .category
                .clone()
                .unwrap_or_else(|| "Uncategorized".to_string()),
        })
        .collect();
    summaries.sort_by(|a, b| a.category.cmp(&b.category).then(a.page.cmp(&b.page)));
    summaries
}

fn write_output(root: &Path, relative: &str, contents: &str) -> Result<()> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn write_json<T: Serialize>(root: &Path, name: &str, value: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", name))?;
    json.push('\n');
    write_output(root, name, &json)
}
