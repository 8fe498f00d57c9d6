//! Form XObjects made from source pages
//!
//! Used by the native layout backend: each selected source page becomes a
//! Form XObject in the output document, which is then drawn scaled into a
//! grid cell.

use std::collections::HashMap;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use crate::error::Result;

/// Cache of source object IDs already copied into the output document
pub type CopyCache = HashMap<ObjectId, ObjectId>;

/// Copy a source page into `output` as a Form XObject
///
/// Returns the XObject ID and the page's `(x0, y0, width, height)` box.
pub fn page_to_xobject(
    output: &mut Document,
    source: &Document,
    page_id: ObjectId,
    cache: &mut CopyCache,
) -> Result<(ObjectId, [f32; 4])> {
    let media_box = inherited(source, page_id, b"MediaBox")
        .and_then(|obj| resolve(source, obj).as_array().ok().cloned())
        .filter(|arr| arr.len() == 4)
        .unwrap_or_else(|| vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(612),
            Object::Integer(792),
        ]);
    let numbers: Vec<f32> = media_box.iter().map(|o| o.as_float().unwrap_or(0.0)).collect();
    let bbox = [numbers[0], numbers[1], numbers[2] - numbers[0], numbers[3] - numbers[1]];

    let content = source.get_page_content(page_id)?;

    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Form".to_vec()));
    dict.set("FormType", Object::Integer(1));
    dict.set("BBox", Object::Array(media_box));

    if let Some(resources) = inherited(source, page_id, b"Resources") {
        let resources = resources.clone();
        dict.set("Resources", copy_object_deep(output, source, &resources, cache)?);
    }

    let xobject_id = output.add_object(Stream::new(dict, content));
    Ok((xobject_id, bbox))
}

/// Look up a page attribute, walking up the page tree if needed
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node_id = page_id;
    for _ in 0..64 {
        let node = doc.get_dictionary(node_id).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        node_id = node.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

/// Deep copy an object from source to output document, following references.
///
/// Uses a cache to avoid copying the same object multiple times.
pub fn copy_object_deep(
    output: &mut Document,
    source: &Document,
    obj: &Object,
    cache: &mut CopyCache,
) -> Result<Object> {
    match obj {
        Object::Reference(id) => {
            if let Some(&new_id) = cache.get(id) {
                return Ok(Object::Reference(new_id));
            }

            // Reserve the ID first so reference cycles resolve to it
            let new_id = output.new_object_id();
            cache.insert(*id, new_id);

            let referenced = source.get_object(*id)?;
            let copied = copy_object_deep(output, source, referenced, cache)?;
            output.objects.insert(new_id, copied);

            Ok(Object::Reference(new_id))
        }
        Object::Dictionary(dict) => {
            let mut new_dict = Dictionary::new();
            for (key, value) in dict.iter() {
                new_dict.set(key.clone(), copy_object_deep(output, source, value, cache)?);
            }
            Ok(Object::Dictionary(new_dict))
        }
        Object::Array(arr) => {
            let new_arr: Result<Vec<_>> = arr
                .iter()
                .map(|item| copy_object_deep(output, source, item, cache))
                .collect();
            Ok(Object::Array(new_arr?))
        }
        Object::Stream(stream) => {
            let mut new_dict = Dictionary::new();
            for (key, value) in stream.dict.iter() {
                new_dict.set(key.clone(), copy_object_deep(output, source, value, cache)?);
            }
            Ok(Object::Stream(Stream {
                dict: new_dict,
                content: stream.content.clone(),
                allows_compression: stream.allows_compression,
                start_position: None,
            }))
        }
        _ => Ok(obj.clone()),
    }
}
