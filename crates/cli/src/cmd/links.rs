//! Links command: outgoing links and backlinks of one document.

use serde::Serialize;
use vaultindex_core::config::ResolvedConfig;

use super::output::{LinkOutput, print_backlinks, print_json, print_links_table};
use super::{display_path, find_document, open_index};
use crate::{LinksArgs, OutputFormat};

#[derive(Serialize)]
struct LinksOutput {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    outgoing: Option<Vec<LinkOutput>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    backlinks: Option<Vec<LinkOutput>>,
}

pub fn run(rc: &ResolvedConfig, args: &LinksArgs) {
    let indexer = open_index(rc);
    let doc = find_document(&indexer, &args.path);

    let show_outgoing = !args.backlinks;
    let show_backlinks = !args.outgoing;

    let outgoing = indexer.get_outgoing_links(&doc.path);
    let backlinks: Vec<String> =
        indexer.get_backlinks(&doc.path).iter().map(|p| display_path(&indexer, p)).collect();

    match args.format {
        OutputFormat::Json => {
            let output = LinksOutput {
                path: doc.relative_path.clone(),
                outgoing: show_outgoing
                    .then(|| outgoing.iter().map(|l| LinkOutput::outgoing(&indexer, l)).collect()),
                backlinks: show_backlinks
                    .then(|| backlinks.into_iter().map(LinkOutput::backlink).collect()),
            };
            print_json(&output);
        }
        OutputFormat::Quiet => {
            if show_outgoing {
                for link in &outgoing {
                    println!("{}", display_path(&indexer, &link.target));
                }
            }
            if show_backlinks {
                for source in &backlinks {
                    println!("{source}");
                }
            }
        }
        OutputFormat::Table => {
            println!("{} ({})", doc.title, doc.relative_path);
            println!();
            if show_outgoing {
                print_links_table(&indexer, &outgoing);
            }
            if show_outgoing && show_backlinks {
                println!();
            }
            if show_backlinks {
                print_backlinks(&backlinks);
            }
        }
    }
}
