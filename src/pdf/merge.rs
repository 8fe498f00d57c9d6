//! PDF concatenation using lopdf

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use lopdf::{Document, Object, ObjectId, Dictionary};
use crate::error::{Error, Result};

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Options for merging PDFs
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Input PDF file paths in the order they should be merged
    pub input_paths: Vec<PathBuf>,
    /// Output PDF file path
    pub output_path: PathBuf,
}

/// Concatenate PDF files into a single PDF, pages in input order
///
/// Based on the lopdf merge example:
/// https://github.com/J-F-Liu/lopdf/blob/main/examples/merge.rs
///
/// Every failure (no inputs, missing file, unreadable or empty document,
/// write error) is reported as [`Error::Assembly`].
pub fn merge_pdfs(options: &MergeOptions) -> Result<()> {
    if options.input_paths.is_empty() {
        return Err(Error::Assembly("No input files provided".to_string()));
    }

    // Validate all input files exist before loading anything
    for path in &options.input_paths {
        if !path.exists() {
            return Err(Error::Assembly(format!("Input not found: {}", path.display())));
        }
    }

    let mut documents: Vec<Document> = Vec::new();
    for path in &options.input_paths {
        let doc = Document::load(path)
            .map_err(|e| Error::Assembly(format!("Cannot load {}: {}", path.display(), e)))?;

        if doc.get_pages().is_empty() {
            return Err(Error::Assembly(format!("PDF has no pages: {}", path.display())));
        }

        documents.push(doc);
    }

    let mut max_id = 1;
    let mut page_ids: Vec<ObjectId> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for mut doc in documents {
        // Renumber objects in this document to avoid conflicts
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();

        // The old page tree nodes are dropped, so pull down what pages inherit from them
        for &page_id in &pages {
            flatten_inherited_attributes(&mut doc, page_id);
        }

        page_ids.extend(pages);
        objects.extend(doc.objects);
    }

    let mut merged_doc = Document::with_version("1.5");
    merged_doc.objects.extend(objects);

    // new_object_id() must hand out IDs above everything imported
    merged_doc.max_id = max_id - 1;

    let pages_id = merged_doc.new_object_id();

    let kids: Vec<Object> = page_ids
        .iter()
        .map(|&id| Object::Reference(id))
        .collect();

    let mut pages_object = Dictionary::new();
    pages_object.set("Type", Object::Name(b"Pages".to_vec()));
    pages_object.set("Count", Object::Integer(page_ids.len() as i64));
    pages_object.set("Kids", Object::Array(kids));

    let catalog_id = merged_doc.new_object_id();
    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));

    merged_doc.objects.insert(catalog_id, Object::Dictionary(catalog));
    merged_doc.objects.insert(pages_id, Object::Dictionary(pages_object));
    merged_doc.trailer.set("Root", Object::Reference(catalog_id));

    for &page_id in &page_ids {
        if let Ok(Object::Dictionary(dict)) = merged_doc.get_object_mut(page_id) {
            dict.set("Parent", Object::Reference(pages_id));
        }
    }

    // Old catalogs and page tree nodes are now unreachable
    merged_doc.prune_objects();

    merged_doc.compress();
    save_as_assembly(&mut merged_doc, &options.output_path)
}

fn save_as_assembly(doc: &mut Document, output: &Path) -> Result<()> {
    doc.save(output)
        .map(|_| ())
        .map_err(|e| Error::Assembly(format!("Cannot write {}: {}", output.display(), e)))
}

/// Copy inheritable attributes from a page's ancestors onto the page itself
fn flatten_inherited_attributes(doc: &mut Document, page_id: ObjectId) {
    let mut inherited: Vec<(&[u8], Object)> = Vec::new();

    if let Ok(page) = doc.get_dictionary(page_id) {
        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
        let mut depth = 0;

        while let Some(parent_id) = parent {
            // Guard against malformed, cyclic trees
            depth += 1;
            if depth > 64 {
                break;
            }
            let Ok(node) = doc.get_dictionary(parent_id) else { break };
            for key in INHERITABLE {
                let already = page.has(key) || inherited.iter().any(|(k, _)| *k == key);
                if !already {
                    if let Ok(value) = node.get(key) {
                        inherited.push((key, value.clone()));
                    }
                }
            }
            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        }
    }

    if let Ok(Object::Dictionary(page)) = doc.get_object_mut(page_id) {
        for (key, value) in inherited {
            page.set(key.to_vec(), value);
        }
    }
}
