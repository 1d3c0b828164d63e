use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::{TempDir, tempdir};
use vaultindex_core::config::ConfigLoader;
use vaultindex_core::index::{FilterCollection, FilterCondition, Query, StringOperator};
use vaultindex_core::vault::OsFs;
use vaultindex_core::VaultIndexer;

fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn vault() -> (TempDir, VaultIndexer) {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    write(
        root,
        "projects/alpha.md",
        "---\naliases: [Alpha Plan]\ntags: [project/alpha]\nstatus: active\n---\n# Alpha\nDo #work and see [[beta]].\n",
    );
    write(root, "projects/beta.md", "# Beta\n- [ ] one\n- [x] two\nBack to [Alpha](alpha.md).\n");
    write(root, "journal/2024-01-01.md", "Met about [[Alpha Plan]] and [[ghost]].\n");
    write(root, ".trash/old.md", "# Old\n[[beta]]\n");
    let indexer = VaultIndexer::new(root, Arc::new(OsFs)).with_excluded(vec![PathBuf::from(".trash")]);
    indexer.initialize().unwrap();
    (tmp, indexer)
}

fn names(docs: &[vaultindex_core::index::DocumentRecord]) -> Vec<String> {
    docs.iter().map(|d| d.relative_path.clone()).collect()
}

#[test]
fn tags_are_normalized_and_exact() {
    let (_tmp, indexer) = vault();
    let alpha = indexer.get_document(Path::new("projects/alpha.md")).unwrap();

    let tags: BTreeSet<&str> = alpha.tags.iter().map(String::as_str).collect();
    assert_eq!(tags, BTreeSet::from(["project", "project/alpha", "work"]));
    assert!(alpha.exact_tags.contains("project/alpha"));
    assert!(alpha.exact_tags.contains("#work"));
    assert_eq!(alpha.title, "Alpha");
    assert_eq!(alpha.aliases, vec!["Alpha Plan".to_string()]);
}

#[test]
fn link_graph_spans_syntaxes() {
    let (tmp, indexer) = vault();
    let root = tmp.path();

    assert_eq!(
        indexer.get_backlinks(Path::new("projects/alpha.md")),
        vec![root.join("journal/2024-01-01.md"), root.join("projects/beta.md")]
    );
    assert_eq!(indexer.get_backlinks(Path::new("projects/beta.md")), vec![root.join("projects/alpha.md")]);
    // Excluded folders are not indexed and contribute no links.
    assert!(indexer.get_document(Path::new(".trash/old.md")).is_none());
    assert_eq!(indexer.document_count(), 3);
}

#[test]
fn repeated_updates_leave_one_record() {
    let (tmp, indexer) = vault();
    let root = tmp.path();

    for i in 0..25 {
        write(root, "projects/beta.md", &format!("# Beta {i}\nrev {i} #rev{i}x\n"));
        indexer.update_file(Path::new("projects/beta.md")).unwrap();
    }

    let all = indexer.get_all_documents();
    assert_eq!(all.iter().filter(|d| d.relative_path == "projects/beta.md").count(), 1);
    assert!(indexer.query(&Query::parse("tag:rev3x").unwrap()).unwrap().is_empty());
    assert_eq!(names(&indexer.query(&Query::parse("tag:rev24x").unwrap()).unwrap()), ["projects/beta.md"]);
    assert!(indexer.get_outgoing_links(Path::new("projects/beta.md")).is_empty());
    assert!(indexer.verify_consistency().is_empty());
}

#[test]
fn deleted_file_is_removed_on_update() {
    let (tmp, indexer) = vault();
    fs::remove_file(tmp.path().join("journal/2024-01-01.md")).unwrap();
    indexer.update_file(Path::new("journal/2024-01-01.md")).unwrap();

    assert_eq!(indexer.document_count(), 2);
    assert_eq!(
        indexer.get_backlinks(Path::new("projects/alpha.md")),
        vec![tmp.path().join("projects/beta.md")]
    );
}

#[test]
fn queries_use_every_field_namespace() {
    let (_tmp, indexer) = vault();
    let run = |expr: &str| names(&indexer.query(&Query::parse(expr).unwrap()).unwrap());

    assert_eq!(run("fm.status:active"), ["projects/alpha.md"]);
    assert_eq!(run("file.folder:projects"), ["projects/alpha.md", "projects/beta.md"]);
    assert_eq!(run("file.name:2024*"), ["journal/2024-01-01.md"]);
    assert_eq!(run("title:beta"), ["projects/beta.md"]);
    assert_eq!(run("!fm.status file.folder:projects"), ["projects/beta.md"]);
    assert_eq!(run("fm.status?"), ["projects/alpha.md"]);
}

#[test]
fn filtered_query_reads_content_lazily() {
    let (_tmp, indexer) = vault();
    let filter = FilterCollection::any(vec![
        FilterCondition::Content { operator: StringOperator::Contains, value: "met about".into() },
        FilterCondition::Name { operator: StringOperator::Equals, value: "beta".into() },
    ]);
    let docs = indexer.query_filtered(&Query::default(), &filter).unwrap();
    assert_eq!(names(&docs), ["journal/2024-01-01.md", "projects/beta.md"]);
}

#[test]
fn config_excludes_trash_and_backups() {
    let tmp = tempdir().unwrap();
    let vault = tmp.path().join("vault");
    write(&vault, "note.md", "# Note");
    write(&vault, ".trash/old.md", "# Old");
    write(&vault, "bin/deleted.md", "# Deleted");
    let cfg = tmp.path().join("config.toml");
    fs::write(
        &cfg,
        format!(
            "version = 1\n[profiles.default]\nvault_root = \"{}\"\ncache_path = \"{{{{vault_root}}}}/.cache/index.db\"\n[operations]\ntrash_dir = \"bin\"\n",
            vault.display()
        ),
    )
    .unwrap();

    let config = ConfigLoader::load(Some(&cfg), None).unwrap();
    let indexer = VaultIndexer::from_config(&config).unwrap();
    let stats = indexer.initialize().unwrap();
    assert_eq!(stats.documents_indexed, 1);
    assert_eq!(stats.cache_hits, 0);

    // A second indexer over the same cache reuses every entry.
    let again = VaultIndexer::from_config(&config).unwrap();
    assert_eq!(again.initialize().unwrap().cache_hits, 1);
}
